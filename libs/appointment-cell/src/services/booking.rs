// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use availability_cell::services::{slots_for, AvailabilityCalendar};
use shared_database::ClinicStore;
use shared_models::auth::{Identity, Role};
use shared_models::clinic::{Appointment, ClinicalRecord};
use shared_utils::clock::ClinicClock;
use shared_utils::state::AppState;

use crate::models::{AppointmentError, PsychologistOption, TransitionAction};
use crate::services::ledger::BookingLedger;
use crate::services::lifecycle::AppointmentLifecycleService;

const MAX_GRANULARITY_MINUTES: i64 = 24 * 60;

pub struct BookingService {
    store: Arc<dyn ClinicStore>,
    calendar: AvailabilityCalendar,
    ledger: BookingLedger,
    lifecycle: AppointmentLifecycleService,
    clock: ClinicClock,
    booking_slot_minutes: i64,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            calendar: AvailabilityCalendar::new(state.store.clone()),
            ledger: BookingLedger::new(state.store.clone()),
            lifecycle: AppointmentLifecycleService::new(),
            clock: state.clock.clone(),
            booking_slot_minutes: state.config.booking_slot_minutes,
        }
    }

    pub fn ledger(&self) -> &BookingLedger {
        &self.ledger
    }

    /// Book `time` on `date` for the patient, opening their chart on the first booking.
    #[instrument(skip(self, notes))]
    pub async fn book(
        &self,
        patient_id: Uuid,
        psychologist_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking {} {}", date, time.format("%H:%M"));

        match self.store.find_psychologist(psychologist_id).await? {
            Some(psychologist) if psychologist.active => {}
            _ => {
                return Err(AppointmentError::NotFound(format!(
                    "psychologist {}",
                    psychologist_id
                )))
            }
        }

        let pinned = self.ledger.pinned_psychologist(patient_id).await?;
        if let Some(pinned_id) = pinned {
            if pinned_id != psychologist_id {
                warn!("Patient is followed by {}, refusing booking", pinned_id);
                return Err(AppointmentError::Policy(pinned_id));
            }
        }

        let windows = self.calendar.windows_for(psychologist_id, date).await?;
        if windows.is_empty() {
            return Err(AppointmentError::NoAvailability(date));
        }

        if !slots_for(&windows, self.booking_slot_minutes).contains(&time) {
            return Err(AppointmentError::SlotUnavailable(format!(
                "{} is not a bookable time on {}",
                time.format("%H:%M"),
                date
            )));
        }

        if self
            .ledger
            .occupied_slots(psychologist_id, date)
            .await?
            .contains(&time)
        {
            return Err(AppointmentError::SlotUnavailable(format!(
                "{} on {} is already taken",
                time.format("%H:%M"),
                date
            )));
        }

        let scheduled_at = date.and_time(time);
        let local_now = self.clock.local_now();
        if scheduled_at <= local_now {
            return Err(AppointmentError::PastDate(format!(
                "{} is not after {}",
                scheduled_at.format("%Y-%m-%d %H:%M"),
                local_now.format("%Y-%m-%d %H:%M")
            )));
        }

        let now = self.clock.now_utc();
        let appointment = Appointment::scheduled(patient_id, psychologist_id, scheduled_at, notes, now);

        // An unpinned patient has no live appointment yet, so this booking opens the chart.
        let clinical_record = pinned.is_none().then(|| {
            ClinicalRecord::open(
                patient_id,
                psychologist_id,
                Some(format!(
                    "Chart created automatically on first booking at {}",
                    local_now.format("%d/%m/%Y %H:%M")
                )),
                now,
            )
        });

        let appointment = self
            .ledger
            .insert(appointment, clinical_record, local_now)
            .await?;

        info!("Booked appointment {}", appointment.id);
        Ok(appointment)
    }

    /// Free start times on `date`. Dates before today have none.
    pub async fn available_slots(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
        granularity_minutes: i64,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        if !(1..=MAX_GRANULARITY_MINUTES).contains(&granularity_minutes) {
            return Err(AppointmentError::Validation(format!(
                "granularity_minutes must be between 1 and {}",
                MAX_GRANULARITY_MINUTES
            )));
        }

        if date < self.clock.today() {
            debug!("Slots requested for past date {}", date);
            return Ok(Vec::new());
        }

        let windows = self.calendar.windows_for(psychologist_id, date).await?;
        let occupied = self.ledger.occupied_slots(psychologist_id, date).await?;

        Ok(slots_for(&windows, granularity_minutes)
            .into_iter()
            .filter(|slot| !occupied.contains(slot))
            .collect())
    }

    /// Psychologists the caller may book: only the pinned one once a patient is pinned.
    pub async fn psychologists_for(&self, caller: &Identity) -> Result<Vec<PsychologistOption>, AppointmentError> {
        let pinned = if caller.is_patient() {
            self.ledger.pinned_psychologist(caller.user_id).await?
        } else {
            None
        };

        if let Some(pinned_id) = pinned {
            let options = self
                .store
                .find_psychologist(pinned_id)
                .await?
                .map(|p| PsychologistOption {
                    id: p.id,
                    full_name: p.full_name,
                    pinned: true,
                })
                .into_iter()
                .collect();
            return Ok(options);
        }

        Ok(self
            .store
            .list_psychologists()
            .await?
            .into_iter()
            .filter(|p| p.active)
            .map(|p| PsychologistOption {
                id: p.id,
                full_name: p.full_name,
                pinned: false,
            })
            .collect())
    }

    pub async fn transition(
        &self,
        caller: &Identity,
        appointment_id: Uuid,
        action: TransitionAction,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.ledger.appointment(appointment_id).await?;
        self.lifecycle.authorize(caller, &appointment, action)?;

        self.ledger
            .transition(appointment_id, action.target_status(), self.clock.now_utc())
            .await
    }

    pub async fn appointment_for(
        &self,
        caller: &Identity,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.ledger.appointment(appointment_id).await?;
        if !appointment.involves(caller.user_id) {
            return Err(AppointmentError::Permission(
                "only participants can view an appointment".to_string(),
            ));
        }
        Ok(appointment)
    }

    /// The caller's own appointments, newest first.
    pub async fn my_appointments(&self, caller: &Identity) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments = match caller.role {
            Role::Patient => self.ledger.patient_appointments(caller.user_id).await?,
            Role::Psychologist => self.ledger.psychologist_history(caller.user_id).await?,
            Role::Admin => {
                return Err(AppointmentError::Permission(
                    "admins have no appointments of their own".to_string(),
                ))
            }
        };

        appointments.reverse();
        Ok(appointments)
    }

    /// A psychologist's appointments in one calendar month, ascending. Defaults to the
    /// current clinic month.
    pub async fn monthly_calendar(
        &self,
        caller: &Identity,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !caller.is_psychologist() {
            return Err(AppointmentError::Permission(
                "only psychologists have a calendar".to_string(),
            ));
        }

        let today = self.clock.today();
        let year = year.unwrap_or(today.year());
        let month = month.unwrap_or(today.month());

        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppointmentError::Validation(format!("invalid month {}-{}", year, month)))?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| AppointmentError::Validation(format!("invalid month {}-{}", year, month)))?;

        let from = first.and_time(NaiveTime::MIN);
        let to = next_first.and_time(NaiveTime::MIN);
        debug!("Calendar window {} .. {}", from, to);

        self.ledger
            .psychologist_appointments(caller.user_id, from, to)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared_utils::test_utils::TestClinic;

    #[tokio::test]
    async fn calendar_rejects_invalid_month() {
        let clinic = TestClinic::new();
        let service = BookingService::new(&clinic.state);
        let psychologist = Identity::new(Uuid::new_v4(), Role::Psychologist);

        let result = service.monthly_calendar(&psychologist, Some(2030), Some(13)).await;
        assert!(matches!(result, Err(AppointmentError::Validation(_))));
    }

    #[tokio::test]
    async fn past_dates_have_no_slots() {
        let clinic = TestClinic::new();
        let service = BookingService::new(&clinic.state);
        let yesterday = clinic.state.clock.today() - Duration::days(1);

        let slots = service.available_slots(Uuid::new_v4(), yesterday, 60).await.unwrap();
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn granularity_outside_one_day_is_rejected() {
        let clinic = TestClinic::new();
        let service = BookingService::new(&clinic.state);
        let today = clinic.state.clock.today();

        for granularity in [0, -15, MAX_GRANULARITY_MINUTES + 1, i64::MAX] {
            let result = service.available_slots(Uuid::new_v4(), today, granularity).await;
            assert!(matches!(result, Err(AppointmentError::Validation(_))), "{}", granularity);
        }
        let result = service.available_slots(Uuid::new_v4(), today, MAX_GRANULARITY_MINUTES).await;
        assert!(result.is_ok());
    }
}
