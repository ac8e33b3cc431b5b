use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::clinic::{
    Appointment, AppointmentStatus, AttendanceWindow, ClinicalRecord, Psychologist, SessionNote,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Record changed concurrently: {0}")]
    StaleWrite(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed storage payload: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything a single booking writes. Applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct BookingCommit {
    pub appointment: Appointment,
    /// Chart to open for the pair when this is the patient's first booking.
    /// Ignored if the pair already has one.
    pub clinical_record: Option<ClinicalRecord>,
    /// Reject the booking if the patient is followed by another psychologist at commit
    /// time (earliest non-cancelled appointment). Raised as `UniqueViolation`.
    pub enforce_continuity: bool,
}

/// Recurrence settings plus the generated weekly appointments. Applied all-or-nothing;
/// appointments whose slot is already held are skipped rather than failing the unit.
#[derive(Debug, Clone)]
pub struct RecurrenceCommit {
    pub record: ClinicalRecord,
    pub appointments: Vec<Appointment>,
}

/// Persistence port for the clinic. Each method is one storage transaction.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    // --- Psychologists ---
    async fn find_psychologist(&self, id: Uuid) -> StoreResult<Option<Psychologist>>;

    async fn list_psychologists(&self) -> StoreResult<Vec<Psychologist>>;

    async fn save_psychologist(&self, psychologist: Psychologist) -> StoreResult<Psychologist>;

    // --- Attendance windows ---
    /// All windows of a psychologist ordered by day of week, then start time.
    async fn attendance_windows(&self, psychologist_id: Uuid) -> StoreResult<Vec<AttendanceWindow>>;

    /// Delete every window of the psychologist and insert `windows` in their place.
    async fn replace_attendance_windows(
        &self,
        psychologist_id: Uuid,
        windows: Vec<AttendanceWindow>,
    ) -> StoreResult<Vec<AttendanceWindow>>;

    // --- Appointments ---
    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    /// Appointments of a psychologist with `from <= scheduled_at < to`, ascending.
    async fn psychologist_appointments(
        &self,
        psychologist_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>>;

    /// Every appointment of a patient ordered by `scheduled_at`, then `created_at`.
    async fn patient_appointments(&self, patient_id: Uuid) -> StoreResult<Vec<Appointment>>;

    /// Every appointment of a psychologist ordered by `scheduled_at`, then `created_at`.
    async fn psychologist_history(&self, psychologist_id: Uuid) -> StoreResult<Vec<Appointment>>;

    /// Distinct patients that have any appointment with the psychologist.
    async fn psychologist_patients(&self, psychologist_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Insert the appointment (and open the chart if requested) atomically.
    /// Fails with `UniqueViolation` if another slot-holding appointment exists for the
    /// same psychologist at the same timestamp.
    async fn commit_booking(&self, commit: BookingCommit) -> StoreResult<Appointment>;

    /// Compare-and-set status change: fails with `StaleWrite` when the stored status
    /// is no longer `expected`.
    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Appointment>;

    // --- Clinical records ---
    async fn find_clinical_record(
        &self,
        patient_id: Uuid,
        psychologist_id: Uuid,
    ) -> StoreResult<Option<ClinicalRecord>>;

    /// Insert the record unless the pair already has one; returns the stored record.
    async fn ensure_clinical_record(&self, record: ClinicalRecord) -> StoreResult<ClinicalRecord>;

    /// Returns the appointments actually inserted.
    async fn commit_recurrence(&self, commit: RecurrenceCommit) -> StoreResult<Vec<Appointment>>;

    async fn append_session_note(&self, note: SessionNote) -> StoreResult<SessionNote>;

    /// Notes of a record, newest session first.
    async fn session_notes(&self, clinical_record_id: Uuid) -> StoreResult<Vec<SessionNote>>;
}
