use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, slot_routes};
use availability_cell::router::availability_routes;
use records_cell::router::records_routes;
use shared_utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Mentalize clinic API is running!" }))
        .nest(
            "/availability",
            availability_routes(state.clone()).merge(slot_routes(state.clone())),
        )
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/records", records_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use shared_utils::test_utils::{hm, monday, TestClinic, TestUser};

    #[tokio::test]
    async fn root_reports_running() {
        let clinic = TestClinic::new();
        let response = create_router(clinic.state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Mentalize clinic API is running!");
    }

    #[tokio::test]
    async fn windows_and_slots_share_the_availability_prefix() {
        let clinic = TestClinic::new();
        let psychologist = TestUser::psychologist("ana@clinic.example");
        clinic.add_psychologist(&psychologist, "Ana Souza").await;
        clinic.add_window(psychologist.id, 0, hm(9, 0), hm(11, 0)).await;
        let token = clinic.token_for(&psychologist);

        for uri in [
            format!("/availability/{}/windows", psychologist.id),
            format!("/availability/{}/slots?date={}", psychologist.id, monday()),
        ] {
            let response = create_router(clinic.state.clone())
                .oneshot(
                    Request::builder()
                        .uri(uri)
                        .header(header::AUTHORIZATION, format!("Bearer {}", token))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = create_router(clinic.state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/availability/{}/slots?date={}", psychologist.id, monday()))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "slots": ["09:00", "10:00"] }));
    }
}
