use std::sync::{Arc, Once};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock server, e.g. `wiremock::MockServer::uri()`.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// A patient or professional known to the test by id and display name.
pub struct TestParty {
    pub id: Uuid,
    pub name: String,
}

impl TestParty {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }

    pub fn patient() -> Self {
        Self::new("Maria Oliveira")
    }

    pub fn professional() -> Self {
        Self::new("Dr. João Pereira")
    }
}

/// Fixed test day (2025-03-10) at the given UTC hour and minute.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0)
        .single()
        .expect("valid test timestamp")
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_row(
        id: Uuid,
        patient_id: Uuid,
        professional_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "professional_id": professional_id,
            "start_time": start.to_rfc3339(),
            "end_time": end.to_rfc3339(),
            "status": status,
            "created_at": "2025-03-01T12:00:00+00:00",
            "updated_at": "2025-03-01T12:00:00+00:00"
        })
    }

    /// Row as returned with the patient and professional names embedded.
    pub fn summary_row(
        id: Uuid,
        patient: &TestParty,
        professional: &TestParty,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: &str,
    ) -> Value {
        let mut row = Self::appointment_row(id, patient.id, professional.id, start, end, status);
        row["patient"] = json!({ "name": patient.name });
        row["professional"] = json!({ "user": { "name": professional.name } });
        row
    }

    pub fn error_response(code: &str, message: &str) -> Value {
        json!({
            "code": code,
            "details": null,
            "hint": null,
            "message": message
        })
    }

    pub fn exclusion_violation() -> Value {
        Self::error_response(
            "23P01",
            "conflicting key value violates exclusion constraint \"appointments_no_overlap\"",
        )
    }
}

static TRACING: Once = Once::new();

/// Install a test subscriber once per process; honours `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_url("http://127.0.0.1:9999").to_app_config();

        assert_eq!(config.supabase_url, "http://127.0.0.1:9999");
        assert_eq!(config.store_token(), "test-service-role-key");
        assert!(config.is_configured());
    }

    #[test]
    fn summary_row_embeds_names() {
        let patient = TestParty::patient();
        let professional = TestParty::professional();
        let row = MockSupabaseResponses::summary_row(
            Uuid::new_v4(), &patient, &professional, at(10, 0), at(11, 0), "pending",
        );

        assert_eq!(row["patient"]["name"], "Maria Oliveira");
        assert_eq!(row["professional"]["user"]["name"], "Dr. João Pereira");
        assert_eq!(row["status"], "pending");
    }
}
