use tracing::{debug, warn};

use shared_models::appointment::AppointmentStatus;

use crate::models::AppointmentError;

/// Appointment status state machine: `pending` may become `confirmed` or
/// `cancelled`; both of those are final.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Status named in an update request. `pending` is never a valid target.
    pub fn parse_requested_status(&self, raw: &str) -> Result<AppointmentStatus, AppointmentError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "pending" => Err(AppointmentError::InvalidStatusTransition {
                from: AppointmentStatus::Pending,
                to: AppointmentStatus::Pending,
            }),
            other => Err(AppointmentError::UnknownStatus(other.to_string())),
        }
    }
}
