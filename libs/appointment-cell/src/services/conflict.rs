use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AppointmentError, ConflictCheckResponse, TimeSlot};
use crate::store::AppointmentStore;

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Check for active appointments of a professional overlapping `slot`.
    pub async fn check_conflicts(
        &self,
        professional_id: Uuid,
        slot: TimeSlot,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!("Checking conflicts for professional {} in {}", professional_id, slot);

        let candidates = self
            .store
            .find_overlapping(professional_id, slot, exclude_appointment_id)
            .await?;

        // The store's filter is trusted for narrowing only; the rule itself is applied here.
        let conflicting_appointments: Vec<_> = candidates
            .into_iter()
            .filter(|apt| apt.professional_id == professional_id)
            .filter(|apt| Some(apt.id) != exclude_appointment_id)
            .filter(|apt| apt.is_active() && apt.slot().overlaps(&slot))
            .collect();

        let has_conflict = !conflicting_appointments.is_empty();
        if has_conflict {
            warn!("Conflict detected for professional {} - {} conflicting appointments",
                  professional_id, conflicting_appointments.len());
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }
}
