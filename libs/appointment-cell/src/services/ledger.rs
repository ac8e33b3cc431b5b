// libs/appointment-cell/src/services/ledger.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{BookingCommit, ClinicStore, StoreError};
use shared_models::clinic::{Appointment, AppointmentStatus, ClinicalRecord};

use crate::models::AppointmentError;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Appointment book of the clinic: occupancy, the continuity-of-care pin, inserts and
/// status changes.
pub struct BookingLedger {
    store: Arc<dyn ClinicStore>,
    lifecycle: AppointmentLifecycleService,
}

fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

impl BookingLedger {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Start times held by scheduled or confirmed appointments on `date`.
    pub async fn occupied_slots(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, AppointmentError> {
        let (from, to) = day_bounds(date);
        let occupied = self
            .store
            .psychologist_appointments(psychologist_id, from, to)
            .await?
            .into_iter()
            .filter(|apt| apt.status.occupies_slot())
            .map(|apt| apt.time())
            .collect();

        Ok(occupied)
    }

    pub async fn has_conflict(
        &self,
        psychologist_id: Uuid,
        scheduled_at: NaiveDateTime,
    ) -> Result<bool, AppointmentError> {
        let (from, to) = day_bounds(scheduled_at.date());
        let appointments = self
            .store
            .psychologist_appointments(psychologist_id, from, to)
            .await?;

        Ok(appointments
            .iter()
            .any(|apt| apt.scheduled_at == scheduled_at && apt.status.occupies_slot()))
    }

    /// Psychologist of the patient's earliest appointment that was not cancelled.
    pub async fn pinned_psychologist(&self, patient_id: Uuid) -> Result<Option<Uuid>, AppointmentError> {
        let pinned = self
            .store
            .patient_appointments(patient_id)
            .await?
            .into_iter()
            .filter(|apt| apt.status != AppointmentStatus::Cancelled)
            .min_by_key(|apt| (apt.scheduled_at, apt.created_at))
            .map(|apt| apt.psychologist_id);

        debug!("Patient {} pinned to {:?}", patient_id, pinned);
        Ok(pinned)
    }

    /// Insert an appointment, opening `clinical_record` in the same transaction when given.
    pub async fn insert(
        &self,
        appointment: Appointment,
        clinical_record: Option<ClinicalRecord>,
        local_now: NaiveDateTime,
    ) -> Result<Appointment, AppointmentError> {
        if appointment.scheduled_at <= local_now {
            return Err(AppointmentError::Validation(format!(
                "appointment at {} is not in the future",
                appointment.scheduled_at
            )));
        }

        if self
            .has_conflict(appointment.psychologist_id, appointment.scheduled_at)
            .await?
        {
            warn!(
                "Psychologist {} already booked at {}",
                appointment.psychologist_id, appointment.scheduled_at
            );
            return Err(AppointmentError::Conflict(format!(
                "psychologist already booked at {}",
                appointment.scheduled_at.format("%Y-%m-%d %H:%M")
            )));
        }

        let stored = self
            .store
            .commit_booking(BookingCommit {
                appointment,
                clinical_record,
                enforce_continuity: true,
            })
            .await?;

        info!(
            "Appointment {} stored for patient {} with psychologist {} at {}",
            stored.id, stored.patient_id, stored.psychologist_id, stored.scheduled_at
        );
        Ok(stored)
    }

    /// Move an appointment along the status machine.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.appointment(appointment_id).await?;
        self.lifecycle
            .validate_status_transition(current.status, new_status)?;

        let updated = self
            .store
            .update_appointment_status(appointment_id, current.status, new_status, updated_at)
            .await
            .map_err(|e| match e {
                StoreError::StaleWrite(msg) => {
                    warn!("Lost status race on appointment {}: {}", appointment_id, msg);
                    AppointmentError::Conflict(msg)
                }
                StoreError::NotFound(msg) => AppointmentError::NotFound(msg),
                other => AppointmentError::from(other),
            })?;

        info!("Appointment {} moved from {} to {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("appointment {}", appointment_id)))
    }

    pub async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.patient_appointments(patient_id).await?)
    }

    pub async fn psychologist_history(&self, psychologist_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.psychologist_history(psychologist_id).await?)
    }

    /// Appointments with `from <= scheduled_at < to`, ascending.
    pub async fn psychologist_appointments(
        &self,
        psychologist_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .store
            .psychologist_appointments(psychologist_id, from, to)
            .await?)
    }
}
