// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::state::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::my_appointments))
        .route("/calendar", get(handlers::monthly_calendar))
        .route("/psychologists", get(handlers::list_psychologists))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/transition", post(handlers::transition_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

/// Free-slot lookup, mounted next to the availability routes.
pub fn slot_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/{psychologist_id}/slots", get(handlers::get_available_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
