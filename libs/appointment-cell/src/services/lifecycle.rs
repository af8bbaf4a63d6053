// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus, StatusTransitionPolicy};

pub struct AppointmentLifecycleService {
    policy: StatusTransitionPolicy,
}

impl AppointmentLifecycleService {
    pub fn new(policy: StatusTransitionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StatusTransitionPolicy {
        self.policy
    }

    /// Validate that a status transition is allowed under the configured policy
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == new_status {
            return Ok(());
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// All statuses reachable from `current_status` in one step
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match self.policy {
            StatusTransitionPolicy::Open => [
                AppointmentStatus::Pending,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ]
            .into_iter()
            .filter(|s| *s != current_status)
            .collect(),
            StatusTransitionPolicy::Strict => match current_status {
                AppointmentStatus::Pending => vec![
                    AppointmentStatus::Confirmed,
                    AppointmentStatus::Completed,
                    AppointmentStatus::Cancelled,
                ],
                AppointmentStatus::Confirmed => vec![
                    AppointmentStatus::Pending,
                    AppointmentStatus::Completed,
                    AppointmentStatus::Cancelled,
                ],
                // Terminal states
                AppointmentStatus::Completed => vec![],
                AppointmentStatus::Cancelled => vec![],
            },
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new(StatusTransitionPolicy::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus::*;

    #[test]
    fn open_policy_allows_uncancelling() {
        let lifecycle = AppointmentLifecycleService::default();

        assert!(lifecycle.validate_status_transition(Cancelled, Pending).is_ok());
        assert!(lifecycle.validate_status_transition(Completed, Confirmed).is_ok());
        assert_eq!(lifecycle.get_valid_transitions(Pending).len(), 3);
    }

    #[test]
    fn strict_policy_makes_cancelled_and_completed_terminal() {
        let lifecycle = AppointmentLifecycleService::new(StatusTransitionPolicy::Strict);

        assert!(lifecycle.validate_status_transition(Pending, Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(Confirmed, Cancelled).is_ok());
        assert!(matches!(
            lifecycle.validate_status_transition(Cancelled, Pending),
            Err(AppointmentError::InvalidStatusTransition { from: Cancelled, to: Pending })
        ));
        assert!(lifecycle.validate_status_transition(Completed, Cancelled).is_err());
    }

    #[test]
    fn keeping_the_same_status_is_always_allowed() {
        let lifecycle = AppointmentLifecycleService::new(StatusTransitionPolicy::Strict);

        for status in [Pending, Confirmed, Completed, Cancelled] {
            assert!(lifecycle.validate_status_transition(status, status).is_ok());
        }
    }
}
