// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::Identity;
use shared_models::clinic::{Appointment, AppointmentStatus};

use crate::models::{AppointmentError, TransitionAction};

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    /// Patients confirm and cancel their own appointments; psychologists close theirs.
    pub fn authorize(
        &self,
        caller: &Identity,
        appointment: &Appointment,
        action: TransitionAction,
    ) -> Result<(), AppointmentError> {
        let allowed = match action {
            TransitionAction::Confirm | TransitionAction::Cancel => {
                caller.is_patient() && appointment.patient_id == caller.user_id
            }
            TransitionAction::Complete | TransitionAction::MarkNoShow => {
                caller.is_psychologist() && appointment.psychologist_id == caller.user_id
            }
        };

        if !allowed {
            warn!(
                "User {} ({}) may not {} appointment {}",
                caller.user_id, caller.role, action, appointment.id
            );
            return Err(AppointmentError::Permission(format!(
                "{} cannot {} this appointment",
                caller.role, action
            )));
        }

        Ok(())
    }
}
