use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::extractor::auth_middleware;
use shared_utils::state::AppState;

use crate::handlers;

pub fn availability_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/{psychologist_id}/windows",
            get(handlers::get_windows).put(handlers::set_windows),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
