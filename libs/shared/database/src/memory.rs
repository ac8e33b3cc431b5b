use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::clinic::{
    Appointment, AppointmentStatus, AttendanceWindow, ClinicalRecord, Psychologist, SessionNote,
};

use crate::store::{BookingCommit, ClinicStore, RecurrenceCommit, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct ClinicState {
    psychologists: HashMap<Uuid, Psychologist>,
    windows: Vec<AttendanceWindow>,
    appointments: Vec<Appointment>,
    records: Vec<ClinicalRecord>,
    notes: Vec<SessionNote>,
}

impl ClinicState {
    fn slot_taken(&self, psychologist_id: Uuid, scheduled_at: NaiveDateTime) -> bool {
        self.appointments.iter().any(|apt| {
            apt.psychologist_id == psychologist_id
                && apt.scheduled_at == scheduled_at
                && apt.status.occupies_slot()
        })
    }

    fn pinned_psychologist(&self, patient_id: Uuid) -> Option<Uuid> {
        self.appointments
            .iter()
            .filter(|apt| apt.patient_id == patient_id && apt.status != AppointmentStatus::Cancelled)
            .min_by_key(|apt| (apt.scheduled_at, apt.created_at))
            .map(|apt| apt.psychologist_id)
    }

    fn record_for(&self, patient_id: Uuid, psychologist_id: Uuid) -> Option<&ClinicalRecord> {
        self.records.iter().find(|r| r.belongs_to(patient_id, psychologist_id))
    }
}

/// Process-local store. Writers are serialised by the lock and every write is staged on a
/// copy of the state that only replaces the live state once the whole unit succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<ClinicState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transaction<T, F>(&self, apply: F) -> StoreResult<T>
    where
        F: FnOnce(&mut ClinicState) -> StoreResult<T>,
    {
        let mut live = self.state.write().await;
        let mut staged = live.clone();
        let result = apply(&mut staged)?;
        *live = staged;
        Ok(result)
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn find_psychologist(&self, id: Uuid) -> StoreResult<Option<Psychologist>> {
        Ok(self.state.read().await.psychologists.get(&id).cloned())
    }

    async fn list_psychologists(&self) -> StoreResult<Vec<Psychologist>> {
        let state = self.state.read().await;
        let mut psychologists: Vec<Psychologist> = state.psychologists.values().cloned().collect();
        psychologists.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(psychologists)
    }

    async fn save_psychologist(&self, psychologist: Psychologist) -> StoreResult<Psychologist> {
        self.transaction(|state| {
            state.psychologists.insert(psychologist.id, psychologist.clone());
            Ok(psychologist)
        })
        .await
    }

    async fn attendance_windows(&self, psychologist_id: Uuid) -> StoreResult<Vec<AttendanceWindow>> {
        let state = self.state.read().await;
        let mut windows: Vec<AttendanceWindow> = state
            .windows
            .iter()
            .filter(|w| w.psychologist_id == psychologist_id)
            .cloned()
            .collect();
        windows.sort_by_key(|w| (w.day_of_week, w.start_time));
        Ok(windows)
    }

    async fn replace_attendance_windows(
        &self,
        psychologist_id: Uuid,
        windows: Vec<AttendanceWindow>,
    ) -> StoreResult<Vec<AttendanceWindow>> {
        self.transaction(|state| {
            if windows.iter().any(|w| w.psychologist_id != psychologist_id) {
                return Err(StoreError::Integrity(
                    "window belongs to another psychologist".to_string(),
                ));
            }

            state.windows.retain(|w| w.psychologist_id != psychologist_id);
            state.windows.extend(windows.iter().cloned());

            let mut stored = windows;
            stored.sort_by_key(|w| (w.day_of_week, w.start_time));
            debug!("Stored {} attendance windows for {}", stored.len(), psychologist_id);
            Ok(stored)
        })
        .await
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let state = self.state.read().await;
        Ok(state.appointments.iter().find(|apt| apt.id == id).cloned())
    }

    async fn psychologist_appointments(
        &self,
        psychologist_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .iter()
            .filter(|apt| {
                apt.psychologist_id == psychologist_id
                    && apt.scheduled_at >= from
                    && apt.scheduled_at < to
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|apt| (apt.scheduled_at, apt.created_at));
        Ok(appointments)
    }

    async fn patient_appointments(&self, patient_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .iter()
            .filter(|apt| apt.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|apt| (apt.scheduled_at, apt.created_at));
        Ok(appointments)
    }

    async fn psychologist_history(&self, psychologist_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .iter()
            .filter(|apt| apt.psychologist_id == psychologist_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|apt| (apt.scheduled_at, apt.created_at));
        Ok(appointments)
    }

    async fn psychologist_patients(&self, psychologist_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let patients: BTreeSet<Uuid> = state
            .appointments
            .iter()
            .filter(|apt| apt.psychologist_id == psychologist_id)
            .map(|apt| apt.patient_id)
            .collect();
        Ok(patients.into_iter().collect())
    }

    async fn commit_booking(&self, commit: BookingCommit) -> StoreResult<Appointment> {
        self.transaction(|state| {
            let appointment = commit.appointment;

            if state.appointments.iter().any(|apt| apt.id == appointment.id) {
                return Err(StoreError::UniqueViolation(format!(
                    "appointment {} already exists",
                    appointment.id
                )));
            }

            if appointment.status.occupies_slot()
                && state.slot_taken(appointment.psychologist_id, appointment.scheduled_at)
            {
                return Err(StoreError::UniqueViolation(format!(
                    "psychologist {} already booked at {}",
                    appointment.psychologist_id, appointment.scheduled_at
                )));
            }

            if commit.enforce_continuity {
                if let Some(pinned) = state.pinned_psychologist(appointment.patient_id) {
                    if pinned != appointment.psychologist_id {
                        return Err(StoreError::UniqueViolation(format!(
                            "patient {} is already followed by psychologist {}",
                            appointment.patient_id, pinned
                        )));
                    }
                }
            }

            state.appointments.push(appointment.clone());

            if let Some(record) = commit.clinical_record {
                if !record.belongs_to(appointment.patient_id, appointment.psychologist_id) {
                    return Err(StoreError::Integrity(
                        "clinical record does not match the booked pair".to_string(),
                    ));
                }

                if state.record_for(record.patient_id, record.psychologist_id).is_none() {
                    debug!("Opening clinical record {} with first booking", record.id);
                    state.records.push(record);
                }
            }

            Ok(appointment)
        })
        .await
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        self.transaction(|state| {
            let appointment = state
                .appointments
                .iter_mut()
                .find(|apt| apt.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("appointment {}", id)))?;

            if appointment.status != expected {
                return Err(StoreError::StaleWrite(format!(
                    "appointment {} is {} not {}",
                    id, appointment.status, expected
                )));
            }

            appointment.status = next;
            appointment.updated_at = updated_at;
            Ok(appointment.clone())
        })
        .await
    }

    async fn find_clinical_record(
        &self,
        patient_id: Uuid,
        psychologist_id: Uuid,
    ) -> StoreResult<Option<ClinicalRecord>> {
        let state = self.state.read().await;
        Ok(state.record_for(patient_id, psychologist_id).cloned())
    }

    async fn ensure_clinical_record(&self, record: ClinicalRecord) -> StoreResult<ClinicalRecord> {
        self.transaction(|state| {
            if let Some(existing) = state.record_for(record.patient_id, record.psychologist_id) {
                return Ok(existing.clone());
            }
            state.records.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn commit_recurrence(&self, commit: RecurrenceCommit) -> StoreResult<Vec<Appointment>> {
        self.transaction(|state| {
            let record = commit.record;

            let stored = state
                .records
                .iter_mut()
                .find(|r| r.id == record.id)
                .ok_or_else(|| StoreError::NotFound(format!("clinical record {}", record.id)))?;

            if !stored.belongs_to(record.patient_id, record.psychologist_id) {
                return Err(StoreError::Integrity(
                    "clinical record pair cannot change".to_string(),
                ));
            }
            *stored = record.clone();

            let mut created = Vec::new();
            for appointment in commit.appointments {
                if !record.belongs_to(appointment.patient_id, appointment.psychologist_id) {
                    return Err(StoreError::Integrity(
                        "recurring appointment does not match the record pair".to_string(),
                    ));
                }

                if state.slot_taken(appointment.psychologist_id, appointment.scheduled_at) {
                    debug!("Skipping recurring slot {} already held", appointment.scheduled_at);
                    continue;
                }

                state.appointments.push(appointment.clone());
                created.push(appointment);
            }

            Ok(created)
        })
        .await
    }

    async fn append_session_note(&self, note: SessionNote) -> StoreResult<SessionNote> {
        self.transaction(|state| {
            if !state.records.iter().any(|r| r.id == note.clinical_record_id) {
                return Err(StoreError::NotFound(format!(
                    "clinical record {}",
                    note.clinical_record_id
                )));
            }
            state.notes.push(note.clone());
            Ok(note)
        })
        .await
    }

    async fn session_notes(&self, clinical_record_id: Uuid) -> StoreResult<Vec<SessionNote>> {
        let state = self.state.read().await;
        let mut notes: Vec<SessionNote> = state
            .notes
            .iter()
            .filter(|n| n.clinical_record_id == clinical_record_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| {
            b.session_date
                .cmp(&a.session_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(notes)
    }
}
