use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use records_cell::router::records_routes;
use shared_models::clinic::AppointmentStatus;
use shared_utils::state::AppState;
use shared_utils::test_utils::{at, monday, TestClinic, TestUser, UnavailableStore};

fn app(state: Arc<AppState>) -> Router {
    Router::new().nest("/records", records_routes(state))
}

fn request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn setup() -> (TestClinic, TestUser, TestUser) {
    let clinic = TestClinic::new();
    let psychologist = TestUser::psychologist("ana@clinic.example");
    let patient = TestUser::patient("patient@example.com");
    clinic.add_psychologist(&psychologist, "Ana Souza").await;
    clinic
        .seed_appointment(patient.id, psychologist.id, at(monday(), 9, 0), AppointmentStatus::Scheduled)
        .await;
    (clinic, psychologist, patient)
}

#[tokio::test]
async fn records_require_a_token() {
    let (clinic, _psychologist, patient) = setup().await;

    let response = app(clinic.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/records/{}", patient.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chart_and_notes_over_http() {
    let (clinic, psychologist, patient) = setup().await;
    let token = clinic.token_for(&psychologist);

    let response = app(clinic.state.clone())
        .oneshot(request(Method::GET, &format!("/records/{}", patient.id), &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["record"]["patient_id"], json!(patient.id));
    assert_eq!(body["appointments"].as_array().unwrap().len(), 1);

    let notes_uri = format!("/records/{}/notes", patient.id);
    let response = app(clinic.state.clone())
        .oneshot(request(
            Method::POST,
            &notes_uri,
            &token,
            Some(json!({ "notes": "first session", "session_date": "2030-01-07" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["note"]["session_date"], "2030-01-07");

    let response = app(clinic.state.clone())
        .oneshot(request(Method::POST, &notes_uri, &token, Some(json!({ "notes": "" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(clinic.state.clone())
        .oneshot(request(Method::GET, &notes_uri, &token, None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["notes"].as_array().unwrap().len(), 1);
    assert_eq!(body["notes"][0]["notes"], "first session");
}

#[tokio::test]
async fn patients_cannot_read_charts() {
    let (clinic, _psychologist, patient) = setup().await;
    let token = clinic.token_for(&patient);

    let response = app(clinic.state.clone())
        .oneshot(request(Method::GET, &format!("/records/{}", patient.id), &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(clinic.state.clone())
        .oneshot(request(Method::GET, "/records/patients", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn recurrence_and_patient_list_over_http() {
    let (clinic, psychologist, patient) = setup().await;
    let token = clinic.token_for(&psychologist);

    let response = app(clinic.state.clone())
        .oneshot(request(
            Method::POST,
            &format!("/records/{}/recurrence", patient.id),
            &token,
            Some(json!({ "day_of_week": 3, "time": "14:00:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["created"], 12);
    assert_eq!(body["record"]["recurrence_enabled"], true);

    let response = app(clinic.state.clone())
        .oneshot(request(Method::GET, "/records/patients", &token, None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["patients"][0], json!(patient.id));
}

#[tokio::test]
async fn storage_outage_is_503() {
    let clinic = TestClinic::new();
    let state = clinic.state_with_store(Arc::new(UnavailableStore));
    let psychologist = TestUser::psychologist("ana@clinic.example");

    let response = app(state)
        .oneshot(request(
            Method::GET,
            "/records/patients",
            &clinic.token_for(&psychologist),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
