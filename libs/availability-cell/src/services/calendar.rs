use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::ClinicStore;
use shared_models::auth::Identity;
use shared_models::clinic::{weekday_index, AttendanceWindow};

use crate::models::{AvailabilityError, WindowInput};

/// Weekly attendance windows per psychologist.
pub struct AvailabilityCalendar {
    store: Arc<dyn ClinicStore>,
}

impl AvailabilityCalendar {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Active windows on the weekday of `date`, ordered by start time.
    pub async fn windows_for(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceWindow>, AvailabilityError> {
        let day = weekday_index(date);

        let mut windows: Vec<AttendanceWindow> = self
            .store
            .attendance_windows(psychologist_id)
            .await?
            .into_iter()
            .filter(|w| w.active && w.day_of_week == day)
            .collect();
        windows.sort_by_key(|w| w.start_time);

        debug!("{} windows for psychologist {} on {}", windows.len(), psychologist_id, date);
        Ok(windows)
    }

    pub async fn windows(&self, psychologist_id: Uuid) -> Result<Vec<AttendanceWindow>, AvailabilityError> {
        Ok(self.store.attendance_windows(psychologist_id).await?)
    }

    /// Replace the psychologist's whole weekly schedule.
    pub async fn set_availability(
        &self,
        caller: &Identity,
        psychologist_id: Uuid,
        inputs: Vec<WindowInput>,
    ) -> Result<Vec<AttendanceWindow>, AvailabilityError> {
        if !caller.is_psychologist() || caller.user_id != psychologist_id {
            warn!("User {} tried to edit the schedule of {}", caller.user_id, psychologist_id);
            return Err(AvailabilityError::Permission(
                "Only the psychologist can change their own schedule".to_string(),
            ));
        }

        let windows = inputs
            .into_iter()
            .map(|input| validate_window(psychologist_id, input))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self
            .store
            .replace_attendance_windows(psychologist_id, windows)
            .await?;

        info!("Psychologist {} now has {} attendance windows", psychologist_id, stored.len());
        Ok(stored)
    }
}

fn validate_window(psychologist_id: Uuid, input: WindowInput) -> Result<AttendanceWindow, AvailabilityError> {
    let day = u8::try_from(input.day_of_week)
        .ok()
        .filter(|day| *day <= 6)
        .ok_or_else(|| {
            AvailabilityError::Validation(format!(
                "day_of_week must be between 0 (Monday) and 6 (Sunday), got {}",
                input.day_of_week
            ))
        })?;

    if input.start_time >= input.end_time {
        return Err(AvailabilityError::Validation(format!(
            "start_time {} must be before end_time {}",
            input.start_time.format("%H:%M"),
            input.end_time.format("%H:%M")
        )));
    }

    Ok(AttendanceWindow::new(psychologist_id, day, input.start_time, input.end_time))
}
