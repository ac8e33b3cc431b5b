// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use availability_cell::models::AvailabilityError;
use shared_database::StoreError;
use shared_models::clinic::AppointmentStatus;
use shared_models::error::AppError;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub psychologist_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    Confirm,
    Cancel,
    Complete,
    MarkNoShow,
}

impl TransitionAction {
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            TransitionAction::Confirm => AppointmentStatus::Confirmed,
            TransitionAction::Cancel => AppointmentStatus::Cancelled,
            TransitionAction::Complete => AppointmentStatus::Completed,
            TransitionAction::MarkNoShow => AppointmentStatus::NoShow,
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionAction::Confirm => "confirm",
            TransitionAction::Cancel => "cancel",
            TransitionAction::Complete => "complete",
            TransitionAction::MarkNoShow => "mark_no_show",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub action: TransitionAction,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Entry of the "choose your psychologist" list shown to patients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PsychologistOption {
    pub id: Uuid,
    pub full_name: String,
    pub pinned: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment date is in the past: {0}")]
    PastDate(String),

    #[error("Psychologist does not attend on {0}")]
    NoAvailability(NaiveDate),

    #[error("Slot not available: {0}")]
    SlotUnavailable(String),

    #[error("Patient is already followed by psychologist {0}")]
    Policy(Uuid),

    #[error("Appointment conflicts with existing booking: {0}")]
    Conflict(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not allowed: {0}")]
    Permission(String),

    #[error("Booking storage unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<StoreError> for AppointmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(msg) => AppointmentError::Conflict(msg),
            other => {
                error!("Appointment storage failure: {}", other);
                AppointmentError::ServiceUnavailable(other.to_string())
            }
        }
    }
}

impl From<AvailabilityError> for AppointmentError {
    fn from(e: AvailabilityError) -> Self {
        match e {
            AvailabilityError::Validation(msg) => AppointmentError::Validation(msg),
            AvailabilityError::Permission(msg) => AppointmentError::Permission(msg),
            AvailabilityError::ServiceUnavailable(msg) => AppointmentError::ServiceUnavailable(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        let message = e.to_string();
        match e {
            AppointmentError::Validation(_) => AppError::ValidationError(message),
            AppointmentError::PastDate(_) | AppointmentError::NoAvailability(_) => {
                AppError::Unprocessable(message)
            }
            AppointmentError::SlotUnavailable(_)
            | AppointmentError::Conflict(_)
            | AppointmentError::InvalidTransition { .. } => AppError::Conflict(message),
            AppointmentError::Policy(_) | AppointmentError::Permission(_) => AppError::Forbidden(message),
            AppointmentError::NotFound(_) => AppError::NotFound(message),
            AppointmentError::ServiceUnavailable(_) => AppError::ServiceUnavailable(message),
        }
    }
}
