use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WindowInput {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAvailabilityRequest {
    pub windows: Vec<WindowInput>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub granularity_minutes: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotsResponse {
    pub slots: Vec<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not allowed: {0}")]
    Permission(String),

    #[error("Scheduling storage unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<StoreError> for AvailabilityError {
    fn from(e: StoreError) -> Self {
        error!("Availability storage failure: {}", e);
        AvailabilityError::ServiceUnavailable(e.to_string())
    }
}

impl From<AvailabilityError> for AppError {
    fn from(e: AvailabilityError) -> Self {
        match e {
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::Permission(msg) => AppError::Forbidden(msg),
            AvailabilityError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}
