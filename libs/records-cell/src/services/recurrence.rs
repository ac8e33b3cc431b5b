use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{info, instrument};
use uuid::Uuid;

use shared_database::{ClinicStore, RecurrenceCommit};
use shared_models::auth::Identity;
use shared_models::clinic::{weekday_index, Appointment, AppointmentStatus};
use shared_utils::clock::ClinicClock;
use shared_utils::state::AppState;

use crate::models::{RecordError, RecurrenceOutcome, RecurrenceRequest};
use crate::services::records::RecordsService;

/// Weekly standing appointments for a patient, stored on their chart.
pub struct RecurrenceService {
    records: RecordsService,
    store: Arc<dyn ClinicStore>,
    clock: ClinicClock,
    weeks: u32,
}

/// First date strictly after `today` falling on `day_of_week` (Monday = 0).
pub fn next_occurrence(today: NaiveDate, day_of_week: u8) -> NaiveDate {
    let ahead = (i64::from(day_of_week) - i64::from(weekday_index(today))).rem_euclid(7);
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(ahead)
}

impl RecurrenceService {
    pub fn new(state: &AppState) -> Self {
        Self {
            records: RecordsService::new(state),
            store: state.store.clone(),
            clock: state.clock.clone(),
            weeks: state.config.recurrence_weeks,
        }
    }

    #[instrument(skip(self, caller), fields(psychologist = %caller.user_id))]
    pub async fn configure(
        &self,
        caller: &Identity,
        patient_id: Uuid,
        request: RecurrenceRequest,
    ) -> Result<RecurrenceOutcome, RecordError> {
        let shared = self.records.authorize(caller, patient_id).await?;

        let day = u8::try_from(request.day_of_week)
            .ok()
            .filter(|day| *day <= 6)
            .ok_or_else(|| {
                RecordError::Validation(format!(
                    "day_of_week must be between 0 (Monday) and 6 (Sunday), got {}",
                    request.day_of_week
                ))
            })?;

        let mut record = self.records.record_for(patient_id, caller.user_id).await?;
        record.recurrence_enabled = true;
        record.recurrence_day_of_week = Some(day);
        record.recurrence_time = Some(request.time);

        let already_booked: HashSet<_> = shared
            .iter()
            .filter(|apt| apt.status != AppointmentStatus::Cancelled)
            .map(|apt| apt.scheduled_at)
            .collect();

        let now = self.clock.now_utc();
        let appointments: Vec<Appointment> = self
            .occurrences(day, request.time)
            .into_iter()
            .filter(|scheduled_at| !already_booked.contains(scheduled_at))
            .map(|scheduled_at| Appointment::scheduled(patient_id, caller.user_id, scheduled_at, None, now))
            .collect();

        let created = self
            .store
            .commit_recurrence(RecurrenceCommit {
                record: record.clone(),
                appointments,
            })
            .await?;

        info!("Recurrence set on record {}: {} appointments created", record.id, created.len());
        Ok(RecurrenceOutcome {
            record,
            created: created.len(),
            appointments: created,
        })
    }

    fn occurrences(&self, day: u8, time: NaiveTime) -> Vec<NaiveDateTime> {
        let first = next_occurrence(self.clock.today(), day);
        (0..self.weeks)
            .map(|week| (first + Duration::weeks(i64::from(week))).and_time(time))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_occurrence_is_strictly_after_today() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();

        assert_eq!(next_occurrence(monday, 0), monday + Duration::days(7));
        assert_eq!(next_occurrence(monday, 1), monday + Duration::days(1));
        assert_eq!(next_occurrence(monday, 6), monday + Duration::days(6));

        let sunday = monday - Duration::days(1);
        assert_eq!(next_occurrence(sunday, 0), monday);
    }
}
