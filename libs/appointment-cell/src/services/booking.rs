// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentStatus, AppointmentSummary,
    BookAppointmentRequest, ListQuery, NewAppointment, SchedulingRules, TimeSlot,
    UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::store::{AppointmentStore, SupabaseAppointmentStore};

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    rules: SchedulingRules,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self::with_rules(store, SchedulingRules::default())
    }

    pub fn with_rules(store: Arc<dyn AppointmentStore>, rules: SchedulingRules) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&store)),
            lifecycle_service: AppointmentLifecycleService::new(rules.transition_policy),
            store,
            rules,
        }
    }

    /// Service wired to the PostgREST store described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let store: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::from_config(config));
        Self::with_rules(store, SchedulingRules::from_config(config))
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    /// Book a new appointment in `pending` status.
    ///
    /// Fails with [`AppointmentError::ConflictDetected`] when any active
    /// appointment of the professional overlaps the requested slot; nothing is
    /// written in that case.
    #[instrument(skip(self, request), fields(professional_id = %request.professional_id))]
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let slot = TimeSlot::new(request.start_time, request.end_time)?;

        info!("Booking appointment for patient {} with professional {} at {}",
              request.patient_id, request.professional_id, slot);

        let conflict_check = self
            .conflict_service
            .check_conflicts(request.professional_id, slot, None)
            .await?;

        if conflict_check.has_conflict {
            warn!("Booking rejected: slot {} unavailable for professional {}",
                  slot, request.professional_id);
            return Err(AppointmentError::ConflictDetected);
        }

        if self.rules.reuse_cancelled_slots {
            if let Some(cancelled) = self
                .store
                .find_cancelled(request.patient_id, request.professional_id, slot)
                .await?
            {
                debug!("Reactivating cancelled appointment {}", cancelled.id);
                let reactivated = self
                    .store
                    .update(cancelled.id, AppointmentChanges {
                        start_time: slot.start,
                        end_time: slot.end,
                        status: AppointmentStatus::Pending,
                    })
                    .await?;

                info!("Appointment {} reactivated", reactivated.id);
                return Ok(reactivated);
            }
        }

        let appointment = self
            .store
            .create(NewAppointment {
                patient_id: request.patient_id,
                professional_id: request.professional_id,
                start_time: slot.start,
                end_time: slot.end,
                status: AppointmentStatus::Pending,
            })
            .await?;

        info!("Appointment {} booked successfully with professional {}",
              appointment.id, appointment.professional_id);
        Ok(appointment)
    }

    /// Change the time range and/or status of an appointment.
    ///
    /// The resulting interval is always re-checked against the professional's
    /// other active appointments, whatever the target status.
    #[instrument(skip(self, request))]
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if let (Some(start), Some(end)) = (request.start_time, request.end_time) {
            TimeSlot::new(start, end)?;
        }

        debug!("Updating appointment: {}", appointment_id);
        let current = self.get_appointment(appointment_id).await?;

        let slot = TimeSlot::new(
            request.start_time.unwrap_or(current.start_time),
            request.end_time.unwrap_or(current.end_time),
        )?;
        let status = request.status.unwrap_or(current.status);

        self.lifecycle_service
            .validate_status_transition(current.status, status)?;

        let conflict_check = self
            .conflict_service
            .check_conflicts(current.professional_id, slot, Some(appointment_id))
            .await?;

        if conflict_check.has_conflict {
            warn!("Update of appointment {} rejected: slot {} unavailable", appointment_id, slot);
            return Err(AppointmentError::ConflictDetected);
        }

        let updated = self
            .store
            .update(appointment_id, AppointmentChanges {
                start_time: slot.start,
                end_time: slot.end,
                status,
            })
            .await?;

        info!("Appointment {} updated successfully", appointment_id);
        Ok(updated)
    }

    /// Hard-delete an appointment.
    #[instrument(skip(self))]
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        self.store.delete(appointment_id).await?;

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        self.store
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn list_professional_appointments(
        &self,
        professional_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, AppointmentError> {
        let query = self.resolve_page(query);
        debug!("Listing appointments for professional {} ({:?})", professional_id, query);

        Ok(self.store.list_by_professional(professional_id, query).await?)
    }

    pub async fn list_patient_appointments(
        &self,
        patient_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, AppointmentError> {
        let query = self.resolve_page(query);
        debug!("Listing appointments for patient {} ({:?})", patient_id, query);

        Ok(self.store.list_by_patient(patient_id, query).await?)
    }

    fn resolve_page(&self, query: ListQuery) -> ListQuery {
        ListQuery::page(query.offset, self.rules.page_limit(&query))
    }
}
