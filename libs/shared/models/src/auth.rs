use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Resolve the authenticated caller into the typed identity the cells work with.
    pub fn identity(&self) -> Result<Identity, AppError> {
        let user_id = Uuid::parse_str(&self.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

        let role = self
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role".to_string()))?
            .parse::<Role>()
            .map_err(AppError::Auth)?;

        Ok(Identity { user_id, role })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Psychologist,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Psychologist => write!(f, "psychologist"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "patient" => Ok(Role::Patient),
            "psychologist" => Ok(Role::Psychologist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unsupported role: {}", other)),
        }
    }
}

/// Already-validated `(user_id, role)` pair handed to the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    pub fn is_psychologist(&self) -> bool {
        self.role == Role::Psychologist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn identity_from_valid_user() {
        let id = Uuid::new_v4();
        let identity = user(&id.to_string(), Some("psychologist")).identity().unwrap();
        assert_eq!(identity, Identity::new(id, Role::Psychologist));
        assert!(identity.is_psychologist());
    }

    #[test]
    fn identity_rejects_bad_subject_and_role() {
        assert!(user("not-a-uuid", Some("patient")).identity().is_err());
        assert!(user(&Uuid::new_v4().to_string(), Some("doctor")).identity().is_err());
        assert!(user(&Uuid::new_v4().to_string(), None).identity().is_err());
    }
}
