// libs/appointment-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};
use shared_database::DatabaseError;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, AppointmentSummary, ListQuery,
    NewAppointment, TimeSlot,
};
use crate::store::{AppointmentStore, StoreError};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const SUMMARY_SELECT: &str =
    "*,patient:users!patient_id(name),professional:professional_profiles(user:users(name))";

/// Appointment store backed by the clinic's PostgREST API.
///
/// The no-overlap guarantee comes from the `appointments_no_overlap` exclusion
/// constraint (see `libs/shared/database/migrations`); its violation surfaces
/// as SQLSTATE 23P01 and is reported as [`StoreError::Conflict`].
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NameRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfessionalRef {
    user: Option<NameRef>,
}

#[derive(Debug, Deserialize)]
struct SummaryRow {
    #[serde(flatten)]
    appointment: Appointment,
    patient: Option<NameRef>,
    professional: Option<ProfessionalRef>,
}

impl From<SummaryRow> for AppointmentSummary {
    fn from(row: SummaryRow) -> Self {
        AppointmentSummary {
            appointment: row.appointment,
            patient_name: row.patient.and_then(|p| p.name),
            professional_name: row.professional.and_then(|p| p.user).and_then(|u| u.name),
        }
    }
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(SupabaseClient::new(config)),
            Some(config.store_token().to_string()),
        )
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn fetch_rows(&self, query: &str) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", APPOINTMENTS_PATH, query);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(map_database_error)?;

        decode_rows(rows)
    }

    async fn fetch_summaries(&self, filter: String, query: ListQuery) -> Result<Vec<AppointmentSummary>, StoreError> {
        let mut query_parts = vec![
            filter,
            format!("select={}", SUMMARY_SELECT),
            "order=start_time.asc,id.asc".to_string(),
            format!("offset={}", query.offset),
        ];
        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }

        let path = format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&"));
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(map_database_error)?;

        rows.into_iter()
            .map(|row| serde_json::from_value::<SummaryRow>(row).map(AppointmentSummary::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Issue a write that echoes back the affected rows.
    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(method, path, self.token(), body, Some(return_representation()))
            .await
            .map_err(map_database_error)?;

        decode_rows(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_overlapping(
        &self,
        professional_id: Uuid,
        slot: TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = vec![
            format!("professional_id=eq.{}", professional_id),
            format!("start_time=lt.{}", encode_timestamp(slot.end)),
            format!("end_time=gt.{}", encode_timestamp(slot.start)),
            format!("status=neq.{}", AppointmentStatus::Cancelled),
        ];
        if let Some(exclude_id) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }
        query_parts.push("order=start_time.asc".to_string());

        self.fetch_rows(&query_parts.join("&")).await
    }

    async fn find_cancelled(
        &self,
        patient_id: Uuid,
        professional_id: Uuid,
        slot: TimeSlot,
    ) -> Result<Option<Appointment>, StoreError> {
        let query = [
            format!("patient_id=eq.{}", patient_id),
            format!("professional_id=eq.{}", professional_id),
            format!("start_time=eq.{}", encode_timestamp(slot.start)),
            format!("end_time=eq.{}", encode_timestamp(slot.end)),
            format!("status=eq.{}", AppointmentStatus::Cancelled),
            "limit=1".to_string(),
        ]
        .join("&");

        Ok(self.fetch_rows(&query).await?.into_iter().next())
    }

    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let body = json!({
            "patient_id": appointment.patient_id,
            "professional_id": appointment.professional_id,
            "start_time": appointment.start_time.to_rfc3339(),
            "end_time": appointment.end_time.to_rfc3339(),
            "status": appointment.status.to_string(),
        });

        let created = self
            .write(Method::POST, APPOINTMENTS_PATH, Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Database("Insert returned no rows".to_string()))?;

        debug!("Created appointment {} via PostgREST", created.id);
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let body = json!({
            "start_time": changes.start_time.to_rfc3339(),
            "end_time": changes.end_time.to_rfc3339(),
            "status": changes.status.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        self.write(Method::PATCH, &path, Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let deleted = self.write(Method::DELETE, &path, None).await?;

        if deleted.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let query = format!("id=eq.{}&limit=1", id);
        Ok(self.fetch_rows(&query).await?.into_iter().next())
    }

    async fn list_by_professional(
        &self,
        professional_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, StoreError> {
        self.fetch_summaries(format!("professional_id=eq.{}", professional_id), query)
            .await
    }

    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        query: ListQuery,
    ) -> Result<Vec<AppointmentSummary>, StoreError> {
        self.fetch_summaries(format!("patient_id=eq.{}", patient_id), query)
            .await
    }
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    urlencoding::encode(&ts.to_rfc3339_opts(SecondsFormat::Micros, true)).into_owned()
}

fn decode_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(StoreError::from)
}

fn map_database_error(err: DatabaseError) -> StoreError {
    if err.is_exclusion_violation() {
        warn!("Database rejected overlapping appointment: {}", err);
        return StoreError::Conflict;
    }
    StoreError::Database(err.to_string())
}
