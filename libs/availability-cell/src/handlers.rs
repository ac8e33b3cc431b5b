use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::state::AppState;

use crate::models::SetAvailabilityRequest;
use crate::services::AvailabilityCalendar;

/// Any authenticated caller may read a schedule; patients need it to pick a slot.
#[axum::debug_handler]
pub async fn get_windows(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(psychologist_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    debug!("{} {} reading windows of {}", caller.role, caller.user_id, psychologist_id);

    let calendar = AvailabilityCalendar::new(state.store.clone());
    let windows = calendar.windows(psychologist_id).await?;

    Ok(Json(json!({
        "psychologist_id": psychologist_id,
        "windows": windows
    })))
}

#[axum::debug_handler]
pub async fn set_windows(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(psychologist_id): Path<Uuid>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = user.identity()?;
    let calendar = AvailabilityCalendar::new(state.store.clone());

    let windows = calendar
        .set_availability(&caller, psychologist_id, request.windows)
        .await?;

    Ok(Json(json!({
        "psychologist_id": psychologist_id,
        "windows": windows
    })))
}
