use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tokio::sync::Barrier;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_database::{
    BookingCommit, ClinicStore, MemoryStore, RecurrenceCommit, StoreError, StoreResult,
};
use shared_models::auth::{Identity, Role, User};
use shared_models::clinic::{
    Appointment, AppointmentStatus, AttendanceWindow, ClinicalRecord, Psychologist, SessionNote,
};

use crate::clock::FixedClock;
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic_utc_offset_minutes: -180,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: StorageBackend::Memory,
            port: 3000,
            booking_slot_minutes: 60,
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            recurrence_weeks: 12,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn psychologist(email: &str) -> Self {
        Self::new(email, Role::Psychologist)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.role)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.to_string()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role.to_string(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

// ==============================================================================
// CLINIC FIXTURES
// ==============================================================================

/// 2030-01-07, a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).expect("valid date")
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(hm(hour, minute))
}

/// Memory-backed clinic with a frozen clock. Local "now" defaults to the Sunday
/// before [`monday`] at 09:00.
pub struct TestClinic {
    pub config: TestConfig,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub state: Arc<AppState>,
}

impl Default for TestClinic {
    fn default() -> Self {
        Self::at_local(at(monday() - Duration::days(1), 9, 0))
    }
}

impl TestClinic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_local(local_now: NaiveDateTime) -> Self {
        let config = TestConfig::default();
        let utc_now = local_to_utc(local_now, config.clinic_utc_offset_minutes);
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(utc_now));
        let state = Arc::new(AppState::with_clock(
            config.to_app_config(),
            store.clone(),
            clock.clone(),
        ));

        Self { config, store, clock, state }
    }

    /// Same configuration and clock over an arbitrary store.
    pub fn state_with_store(&self, store: Arc<dyn ClinicStore>) -> Arc<AppState> {
        Arc::new(AppState::with_clock(
            self.config.to_app_config(),
            store,
            self.clock.clone(),
        ))
    }

    pub fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    pub async fn add_psychologist(&self, user: &TestUser, full_name: &str) -> Psychologist {
        self.store
            .save_psychologist(Psychologist {
                id: user.id,
                full_name: full_name.to_string(),
                active: true,
            })
            .await
            .expect("seed psychologist")
    }

    pub async fn add_window(&self, psychologist_id: Uuid, day_of_week: u8, start: NaiveTime, end: NaiveTime) {
        let mut windows = self
            .store
            .attendance_windows(psychologist_id)
            .await
            .expect("read windows");
        windows.push(AttendanceWindow::new(psychologist_id, day_of_week, start, end));
        self.store
            .replace_attendance_windows(psychologist_id, windows)
            .await
            .expect("seed window");
    }

    /// Books straight into the store, bypassing availability and policy checks.
    pub async fn seed_appointment(
        &self,
        patient_id: Uuid,
        psychologist_id: Uuid,
        scheduled_at: NaiveDateTime,
        status: AppointmentStatus,
    ) -> Appointment {
        let mut appointment =
            Appointment::scheduled(patient_id, psychologist_id, scheduled_at, None, Utc::now());
        appointment.status = status;
        self.store
            .commit_booking(BookingCommit {
                appointment,
                clinical_record: None,
                enforce_continuity: false,
            })
            .await
            .expect("seed appointment")
    }
}

fn local_to_utc(local: NaiveDateTime, offset_minutes: i32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::minutes(offset_minutes as i64)))
}

/// Store whose every call fails as if the database were down.
pub struct UnavailableStore;

fn unavailable<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl ClinicStore for UnavailableStore {
    async fn find_psychologist(&self, _id: Uuid) -> StoreResult<Option<Psychologist>> {
        unavailable()
    }

    async fn list_psychologists(&self) -> StoreResult<Vec<Psychologist>> {
        unavailable()
    }

    async fn save_psychologist(&self, _psychologist: Psychologist) -> StoreResult<Psychologist> {
        unavailable()
    }

    async fn attendance_windows(&self, _psychologist_id: Uuid) -> StoreResult<Vec<AttendanceWindow>> {
        unavailable()
    }

    async fn replace_attendance_windows(
        &self,
        _psychologist_id: Uuid,
        _windows: Vec<AttendanceWindow>,
    ) -> StoreResult<Vec<AttendanceWindow>> {
        unavailable()
    }

    async fn find_appointment(&self, _id: Uuid) -> StoreResult<Option<Appointment>> {
        unavailable()
    }

    async fn psychologist_appointments(
        &self,
        _psychologist_id: Uuid,
        _from: NaiveDateTime,
        _to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        unavailable()
    }

    async fn patient_appointments(&self, _patient_id: Uuid) -> StoreResult<Vec<Appointment>> {
        unavailable()
    }

    async fn psychologist_history(&self, _psychologist_id: Uuid) -> StoreResult<Vec<Appointment>> {
        unavailable()
    }

    async fn psychologist_patients(&self, _psychologist_id: Uuid) -> StoreResult<Vec<Uuid>> {
        unavailable()
    }

    async fn commit_booking(&self, _commit: BookingCommit) -> StoreResult<Appointment> {
        unavailable()
    }

    async fn update_appointment_status(
        &self,
        _id: Uuid,
        _expected: AppointmentStatus,
        _next: AppointmentStatus,
        _updated_at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        unavailable()
    }

    async fn find_clinical_record(
        &self,
        _patient_id: Uuid,
        _psychologist_id: Uuid,
    ) -> StoreResult<Option<ClinicalRecord>> {
        unavailable()
    }

    async fn ensure_clinical_record(&self, _record: ClinicalRecord) -> StoreResult<ClinicalRecord> {
        unavailable()
    }

    async fn commit_recurrence(&self, _commit: RecurrenceCommit) -> StoreResult<Vec<Appointment>> {
        unavailable()
    }

    async fn append_session_note(&self, _note: SessionNote) -> StoreResult<SessionNote> {
        unavailable()
    }

    async fn session_notes(&self, _clinical_record_id: Uuid) -> StoreResult<Vec<SessionNote>> {
        unavailable()
    }
}

/// Memory store whose `commit_booking` waits until `parties` bookings have reached it,
/// so every concurrent booking passes the service checks before any of them commits.
pub struct CommitBarrierStore {
    inner: Arc<MemoryStore>,
    barrier: Barrier,
}

impl CommitBarrierStore {
    pub fn new(inner: Arc<MemoryStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl ClinicStore for CommitBarrierStore {
    async fn find_psychologist(&self, id: Uuid) -> StoreResult<Option<Psychologist>> {
        self.inner.find_psychologist(id).await
    }

    async fn list_psychologists(&self) -> StoreResult<Vec<Psychologist>> {
        self.inner.list_psychologists().await
    }

    async fn save_psychologist(&self, psychologist: Psychologist) -> StoreResult<Psychologist> {
        self.inner.save_psychologist(psychologist).await
    }

    async fn attendance_windows(&self, psychologist_id: Uuid) -> StoreResult<Vec<AttendanceWindow>> {
        self.inner.attendance_windows(psychologist_id).await
    }

    async fn replace_attendance_windows(
        &self,
        psychologist_id: Uuid,
        windows: Vec<AttendanceWindow>,
    ) -> StoreResult<Vec<AttendanceWindow>> {
        self.inner.replace_attendance_windows(psychologist_id, windows).await
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        self.inner.find_appointment(id).await
    }

    async fn psychologist_appointments(
        &self,
        psychologist_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        self.inner.psychologist_appointments(psychologist_id, from, to).await
    }

    async fn patient_appointments(&self, patient_id: Uuid) -> StoreResult<Vec<Appointment>> {
        self.inner.patient_appointments(patient_id).await
    }

    async fn psychologist_history(&self, psychologist_id: Uuid) -> StoreResult<Vec<Appointment>> {
        self.inner.psychologist_history(psychologist_id).await
    }

    async fn psychologist_patients(&self, psychologist_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.inner.psychologist_patients(psychologist_id).await
    }

    async fn commit_booking(&self, commit: BookingCommit) -> StoreResult<Appointment> {
        self.barrier.wait().await;
        self.inner.commit_booking(commit).await
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        self.inner.update_appointment_status(id, expected, next, updated_at).await
    }

    async fn find_clinical_record(
        &self,
        patient_id: Uuid,
        psychologist_id: Uuid,
    ) -> StoreResult<Option<ClinicalRecord>> {
        self.inner.find_clinical_record(patient_id, psychologist_id).await
    }

    async fn ensure_clinical_record(&self, record: ClinicalRecord) -> StoreResult<ClinicalRecord> {
        self.inner.ensure_clinical_record(record).await
    }

    async fn commit_recurrence(&self, commit: RecurrenceCommit) -> StoreResult<Vec<Appointment>> {
        self.inner.commit_recurrence(commit).await
    }

    async fn append_session_note(&self, note: SessionNote) -> StoreResult<SessionNote> {
        self.inner.append_session_note(note).await
    }

    async fn session_notes(&self, clinical_record_id: Uuid) -> StoreResult<Vec<SessionNote>> {
        self.inner.session_notes(clinical_record_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.storage_backend, StorageBackend::Memory);
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::psychologist("psy@example.com");
        let user_model = user.to_user();

        assert_eq!(user_model.role.as_deref(), Some("psychologist"));
        assert_eq!(user_model.identity().unwrap(), user.identity());
    }

    #[test]
    fn test_clinic_clock_starts_sunday_morning() {
        let clinic = TestClinic::new();
        assert_eq!(clinic.state.clock.local_now(), at(monday() - Duration::days(1), 9, 0));
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
