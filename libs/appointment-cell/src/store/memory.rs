// libs/appointment-cell/src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentSummary, ListQuery, NewAppointment, TimeSlot,
};
use crate::store::{AppointmentStore, StoreError};

#[derive(Default)]
struct MemoryState {
    appointments: HashMap<Uuid, Appointment>,
    patient_names: HashMap<Uuid, String>,
    professional_names: HashMap<Uuid, String>,
}

impl MemoryState {
    fn overlapping(
        &self,
        professional_id: Uuid,
        slot: &TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Vec<Appointment> {
        let mut found: Vec<Appointment> = self
            .appointments
            .values()
            .filter(|apt| apt.professional_id == professional_id)
            .filter(|apt| Some(apt.id) != exclude_id)
            .filter(|apt| apt.is_active() && apt.slot().overlaps(slot))
            .cloned()
            .collect();
        found.sort_by_key(|apt| apt.start_time);
        found
    }

    fn summarize(&self, appointment: &Appointment) -> AppointmentSummary {
        AppointmentSummary {
            appointment: appointment.clone(),
            patient_name: self.patient_names.get(&appointment.patient_id).cloned(),
            professional_name: self
                .professional_names
                .get(&appointment.professional_id)
                .cloned(),
        }
    }

    fn page<F>(&self, query: ListQuery, filter: F) -> Vec<AppointmentSummary>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut rows: Vec<&Appointment> = self.appointments.values().filter(|&apt| filter(apt)).collect();
        rows.sort_by_key(|apt| (apt.start_time, apt.id));

        rows.into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|apt| self.summarize(apt))
            .collect()
    }
}

/// Process-local store. Every write checks the no-overlap rule under the same
/// write guard that performs it, so concurrent callers cannot double-book.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    state: RwLock<MemoryState>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown in listings for this patient.
    pub async fn register_patient(&self, patient_id: Uuid, name: impl Into<String>) {
        self.state.write().await.patient_names.insert(patient_id, name.into());
    }

    /// Name shown in listings for this professional.
    pub async fn register_professional(&self, professional_id: Uuid, name: impl Into<String>) {
        self.state
            .write()
            .await
            .professional_names
            .insert(professional_id, name.into());
    }

    /// Snapshot of every stored appointment.
    pub async fn all(&self) -> Vec<Appointment> {
        let state = self.state.read().await;
        let mut rows: Vec<Appointment> = state.appointments.values().cloned().collect();
        rows.sort_by_key(|apt| (apt.professional_id, apt.start_time));
        rows
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find_overlapping(
        &self,
        professional_id: Uuid,
        slot: TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.read().await;
        Ok(state.overlapping(professional_id, &slot, exclude_id))
    }

    async fn find_cancelled(
        &self,
        patient_id: Uuid,
        professional_id: Uuid,
        slot: TimeSlot,
    ) -> Result<Option<Appointment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .find(|apt| {
                apt.patient_id == patient_id
                    && apt.professional_id == professional_id
                    && !apt.is_active()
                    && apt.slot() == slot
            })
            .cloned())
    }

    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut state = self.state.write().await;

        if appointment.status.is_active()
            && !state
                .overlapping(appointment.professional_id, &appointment.slot(), None)
                .is_empty()
        {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let stored = Appointment {
            id: Uuid::new_v4(),
            patient_id: appointment.patient_id,
            professional_id: appointment.professional_id,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: appointment.status,
            created_at: now,
            updated_at: now,
        };
        state.appointments.insert(stored.id, stored.clone());

        debug!("Stored appointment {} in memory", stored.id);
        Ok(stored)
    }

    async fn update(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError> {
        let mut state = self.state.write().await;

        let professional_id = state
            .appointments
            .get(&id)
            .map(|apt| apt.professional_id)
            .ok_or(StoreError::NotFound(id))?;

        if changes.status.is_active()
            && !state
                .overlapping(professional_id, &changes.slot(), Some(id))
                .is_empty()
        {
            return Err(StoreError::Conflict);
        }

        let stored = state
            .appointments
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        stored.start_time = changes.start_time;
        stored.end_time = changes.end_time;
        stored.status = changes.status;
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .appointments
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn list_by_professional(
        &self,
        professional_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, StoreError> {
        let state = self.state.read().await;
        Ok(state.page(query, |apt| apt.professional_id == professional_id))
    }

    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, StoreError> {
        let state = self.state.read().await;
        Ok(state.page(query, |apt| apt.patient_id == patient_id))
    }
}
