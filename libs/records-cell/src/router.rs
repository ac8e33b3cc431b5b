use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::state::AppState;

use crate::handlers;

pub fn records_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/patients", get(handlers::list_patients))
        .route("/{patient_id}", get(handlers::get_chart))
        .route(
            "/{patient_id}/notes",
            get(handlers::list_session_notes).post(handlers::add_session_note),
        )
        .route("/{patient_id}/recurrence", post(handlers::configure_recurrence))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
