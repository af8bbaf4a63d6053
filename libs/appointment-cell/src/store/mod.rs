// libs/appointment-cell/src/store/mod.rs
//! Persistence contract for appointments.
//!
//! Implementations must make `create` and `update` reject, atomically with the
//! write itself, any row that would leave two active appointments of one
//! professional overlapping. The booking service checks first to fail fast,
//! but only the store can close the window between that check and the write.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentSummary, ListQuery, NewAppointment, TimeSlot,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Write rejected: overlapping active appointment")]
    Conflict,

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Failed to decode store payload: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Active appointments of `professional_id` intersecting `slot`, ordered by
    /// start time. `exclude_id` is left out of the result.
    async fn find_overlapping(
        &self,
        professional_id: Uuid,
        slot: TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// A cancelled appointment of this patient with this professional on
    /// exactly `slot`, if one exists.
    async fn find_cancelled(
        &self,
        patient_id: Uuid,
        professional_id: Uuid,
        slot: TimeSlot,
    ) -> Result<Option<Appointment>, StoreError>;

    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn update(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list_by_professional(
        &self,
        professional_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, StoreError>;

    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, StoreError>;
}
