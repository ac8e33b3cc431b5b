// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use availability_cell::models::{SlotsQuery, SlotsResponse};
use availability_cell::services::format_slots;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::{BookAppointmentRequest, CalendarQuery, TransitionRequest};
use crate::services::BookingService;

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path(psychologist_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let granularity = query
        .granularity_minutes
        .unwrap_or(state.config.booking_slot_minutes);

    let service = BookingService::new(&state);
    let slots = service
        .available_slots(psychologist_id, query.date, granularity)
        .await?;

    Ok(Json(SlotsResponse {
        slots: format_slots(&slots),
    }))
}

// ==============================================================================
// BOOKING AND LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    if !caller.is_patient() {
        return Err(AppError::Forbidden("Only patients can book appointments".to_string()));
    }

    let service = BookingService::new(&state);
    let appointment = service
        .book(
            caller.user_id,
            request.psychologist_id,
            request.date,
            request.time,
            request.notes,
        )
        .await?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let service = BookingService::new(&state);

    let appointment = service
        .transition(&caller, appointment_id, request.action)
        .await?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let service = BookingService::new(&state);

    let appointment = service.appointment_for(&caller, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let service = BookingService::new(&state);

    let appointments = service.my_appointments(&caller).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn monthly_calendar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let service = BookingService::new(&state);

    let appointments = service
        .monthly_calendar(&caller, query.year, query.month)
        .await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_psychologists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let service = BookingService::new(&state);

    let psychologists = service.psychologists_for(&caller).await?;
    Ok(Json(json!({ "psychologists": psychologists })))
}
