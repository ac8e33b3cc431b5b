use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::clinic::{Appointment, ClinicalRecord, SessionNote};
use shared_models::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct AddSessionNoteRequest {
    pub session_date: Option<NaiveDate>,
    pub notes: String,
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurrenceRequest {
    pub day_of_week: i32,
    pub time: NaiveTime,
}

/// Everything a psychologist sees when opening a patient's chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub record: ClinicalRecord,
    pub notes: Vec<SessionNote>,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurrenceOutcome {
    pub record: ClinicalRecord,
    pub created: usize,
    pub appointments: Vec<Appointment>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not allowed: {0}")]
    Permission(String),

    #[error("Record conflicts with existing data: {0}")]
    Conflict(String),

    #[error("Records storage unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<StoreError> for RecordError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(msg) => RecordError::Conflict(msg),
            StoreError::NotFound(msg) => RecordError::NotFound(msg),
            other => {
                error!("Records storage failure: {}", other);
                RecordError::ServiceUnavailable(other.to_string())
            }
        }
    }
}

impl From<RecordError> for AppError {
    fn from(e: RecordError) -> Self {
        let message = e.to_string();
        match e {
            RecordError::Validation(_) => AppError::ValidationError(message),
            RecordError::NotFound(_) => AppError::NotFound(message),
            RecordError::Permission(_) => AppError::Forbidden(message),
            RecordError::Conflict(_) => AppError::Conflict(message),
            RecordError::ServiceUnavailable(_) => AppError::ServiceUnavailable(message),
        }
    }
}
