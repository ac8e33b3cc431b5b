use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::{AppConfig, StorageBackend};
use shared_database::{BookingCommit, ClinicStore, StoreError, SupabaseStore};
use shared_models::clinic::{Appointment, AppointmentStatus};

fn config(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_service_role_key: "service-key".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        storage_backend: StorageBackend::Supabase,
        port: 3000,
        booking_slot_minutes: 60,
        clinic_utc_offset_minutes: -180,
        recurrence_weeks: 12,
    }
}

fn appointment(status: AppointmentStatus) -> Appointment {
    let at = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap().and_hms_opt(9, 0, 0).unwrap();
    let mut appointment = Appointment::scheduled(Uuid::new_v4(), Uuid::new_v4(), at, None, Utc::now());
    appointment.status = status;
    appointment
}

#[tokio::test]
async fn psychologist_lookup_uses_postgrest_filters() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": id, "full_name": "Ana Souza", "active": true }
        ])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config(&server));
    let found = store.find_psychologist(id).await.unwrap().unwrap();
    assert_eq!(found.full_name, "Ana Souza");
}

#[tokio::test]
async fn booking_goes_through_the_rpc() {
    let server = MockServer::start().await;
    let apt = appointment(AppointmentStatus::Scheduled);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_appointment"))
        .and(body_partial_json(json!({ "p_record": null, "p_enforce_continuity": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(apt)))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config(&server));
    let stored = store
        .commit_booking(BookingCommit {
            appointment: apt.clone(),
            clinical_record: None,
            enforce_continuity: true,
        })
        .await
        .unwrap();
    assert_eq!(stored, apt);
}

#[tokio::test]
async fn duplicate_slot_maps_to_unique_violation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/book_appointment"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config(&server));
    let result = store
        .commit_booking(BookingCommit {
            appointment: appointment(AppointmentStatus::Scheduled),
            clinical_record: None,
            enforce_continuity: true,
        })
        .await;
    assert_matches!(result, Err(StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn empty_patch_reports_stale_write() {
    let server = MockServer::start().await;
    let current = appointment(AppointmentStatus::Cancelled);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", current.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([current])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config(&server));
    let result = store
        .update_appointment_status(current.id, AppointmentStatus::Scheduled, AppointmentStatus::Confirmed, Utc::now())
        .await;
    assert_matches!(result, Err(StoreError::StaleWrite(_)));
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config(&server));
    assert_matches!(
        store.patient_appointments(Uuid::new_v4()).await,
        Err(StoreError::Unavailable(_))
    );
}
