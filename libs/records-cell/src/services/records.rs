use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::ClinicStore;
use shared_models::auth::Identity;
use shared_models::clinic::{Appointment, ClinicalRecord, SessionNote};
use shared_utils::clock::ClinicClock;
use shared_utils::state::AppState;

use crate::models::{AddSessionNoteRequest, ChartView, RecordError};

/// Charts and session notes, one chart per (patient, psychologist) pair.
pub struct RecordsService {
    store: Arc<dyn ClinicStore>,
    clock: ClinicClock,
}

impl RecordsService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    /// The pair's appointments, oldest first. Errors unless the caller is a psychologist
    /// with at least one appointment with the patient.
    pub(crate) async fn authorize(
        &self,
        caller: &Identity,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, RecordError> {
        if !caller.is_psychologist() {
            return Err(RecordError::Permission(
                "only psychologists can access clinical records".to_string(),
            ));
        }

        let shared: Vec<Appointment> = self
            .store
            .patient_appointments(patient_id)
            .await?
            .into_iter()
            .filter(|apt| apt.psychologist_id == caller.user_id)
            .collect();

        if shared.is_empty() {
            warn!("Psychologist {} has no appointment with patient {}", caller.user_id, patient_id);
            return Err(RecordError::Permission(
                "patient has no appointment with this psychologist".to_string(),
            ));
        }

        Ok(shared)
    }

    pub(crate) async fn record_for(&self, patient_id: Uuid, psychologist_id: Uuid) -> Result<ClinicalRecord, RecordError> {
        if let Some(record) = self.store.find_clinical_record(patient_id, psychologist_id).await? {
            return Ok(record);
        }

        info!("Opening clinical record for patient {} with {}", patient_id, psychologist_id);
        let record = ClinicalRecord::open(patient_id, psychologist_id, None, self.clock.now_utc());
        Ok(self.store.ensure_clinical_record(record).await?)
    }

    pub async fn chart(&self, caller: &Identity, patient_id: Uuid) -> Result<ChartView, RecordError> {
        let mut appointments = self.authorize(caller, patient_id).await?;
        let record = self.record_for(patient_id, caller.user_id).await?;
        let notes = self.store.session_notes(record.id).await?;

        appointments.reverse();
        Ok(ChartView {
            record,
            notes,
            appointments,
        })
    }

    pub async fn add_session_note(
        &self,
        caller: &Identity,
        patient_id: Uuid,
        request: AddSessionNoteRequest,
    ) -> Result<SessionNote, RecordError> {
        let shared = self.authorize(caller, patient_id).await?;

        let notes = request.notes.trim();
        if notes.is_empty() {
            return Err(RecordError::Validation("notes are required".to_string()));
        }

        if let Some(appointment_id) = request.appointment_id {
            if !shared.iter().any(|apt| apt.id == appointment_id) {
                return Err(RecordError::Validation(format!(
                    "appointment {} does not belong to this patient and psychologist",
                    appointment_id
                )));
            }
        }

        let record = self.record_for(patient_id, caller.user_id).await?;
        let note = SessionNote {
            id: Uuid::new_v4(),
            clinical_record_id: record.id,
            appointment_id: request.appointment_id,
            session_date: request.session_date.unwrap_or_else(|| self.clock.today()),
            notes: notes.to_string(),
            created_at: self.clock.now_utc(),
        };

        let stored = self.store.append_session_note(note).await?;
        info!("Session note {} added to record {}", stored.id, record.id);
        Ok(stored)
    }

    /// Newest session first. No chart yet means no notes.
    pub async fn session_notes(&self, caller: &Identity, patient_id: Uuid) -> Result<Vec<SessionNote>, RecordError> {
        self.authorize(caller, patient_id).await?;

        match self.store.find_clinical_record(patient_id, caller.user_id).await? {
            Some(record) => Ok(self.store.session_notes(record.id).await?),
            None => {
                debug!("No chart yet for patient {} with {}", patient_id, caller.user_id);
                Ok(Vec::new())
            }
        }
    }

    pub async fn patients(&self, caller: &Identity) -> Result<Vec<Uuid>, RecordError> {
        if !caller.is_psychologist() {
            return Err(RecordError::Permission(
                "only psychologists have patients".to_string(),
            ));
        }

        Ok(self.store.psychologist_patients(caller.user_id).await?)
    }
}
