use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "supabase" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub port: u16,
    pub booking_slot_minutes: i64,
    pub clinic_utc_offset_minutes: i32,
    pub recurrence_weeks: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });

        // The service role key bypasses row level security; the anon key is the fallback.
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to anon key");
                supabase_anon_key.clone()
            });

        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, using in-memory storage", e);
                StorageBackend::Memory
            }),
            Err(_) if !supabase_url.is_empty() => StorageBackend::Supabase,
            Err(_) => {
                warn!("STORAGE_BACKEND not set and no Supabase URL, using in-memory storage");
                StorageBackend::Memory
            }
        };

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            storage_backend,
            port: parse_or_default("PORT", 3000),
            booking_slot_minutes: parse_or_default("BOOKING_SLOT_MINUTES", 60),
            clinic_utc_offset_minutes: parse_or_default("CLINIC_UTC_OFFSET_MINUTES", -180),
            recurrence_weeks: parse_or_default("RECURRENCE_WEEKS", 12),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let auth_ready = !self.supabase_jwt_secret.is_empty();
        match self.storage_backend {
            StorageBackend::Memory => auth_ready,
            StorageBackend::Supabase => {
                auth_ready
                    && !self.supabase_url.is_empty()
                    && !self.supabase_anon_key.is_empty()
            }
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
