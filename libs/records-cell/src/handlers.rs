use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{AddSessionNoteRequest, RecurrenceRequest};
use crate::services::{RecordsService, RecurrenceService};

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let patients = RecordsService::new(&state).patients(&caller).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let chart = RecordsService::new(&state).chart(&caller, patient_id).await?;

    Ok(Json(json!(chart)))
}

#[axum::debug_handler]
pub async fn list_session_notes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let notes = RecordsService::new(&state)
        .session_notes(&caller, patient_id)
        .await?;

    Ok(Json(json!({ "notes": notes })))
}

#[axum::debug_handler]
pub async fn add_session_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<AddSessionNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let note = RecordsService::new(&state)
        .add_session_note(&caller, patient_id, request)
        .await?;

    Ok(Json(json!({
        "note": note,
        "message": "Session note added"
    })))
}

#[axum::debug_handler]
pub async fn configure_recurrence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<RecurrenceRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let outcome = RecurrenceService::new(&state)
        .configure(&caller, patient_id, request)
        .await?;

    Ok(Json(json!({
        "message": format!("Recurrence configured. {} appointments created.", outcome.created),
        "created": outcome.created,
        "record": outcome.record,
        "appointments": outcome.appointments
    })))
}
