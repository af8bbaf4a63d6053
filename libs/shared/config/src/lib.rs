use std::env;
use std::str::FromStr;

use dotenv::dotenv;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub appointment_status_policy: String,
    pub appointment_default_page_size: usize,
    pub appointment_max_page_size: usize,
    pub appointment_reuse_cancelled: bool,
}

impl AppConfig {
    /// Read `.env` (if present) and then the process environment.
    pub fn load() -> Self {
        dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, store requests will use the anon role");
                    String::new()
                }),
            appointment_status_policy: env::var("APPOINTMENT_STATUS_POLICY")
                .unwrap_or_else(|_| "open".to_string()),
            appointment_default_page_size: parse_or("APPOINTMENT_DEFAULT_PAGE_SIZE", 100),
            appointment_max_page_size: parse_or("APPOINTMENT_MAX_PAGE_SIZE", 500),
            appointment_reuse_cancelled: parse_or("APPOINTMENT_REUSE_CANCELLED", true),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    /// Token sent as the bearer on store requests; falls back to the anon key.
    pub fn store_token(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            appointment_status_policy: "open".to_string(),
            appointment_default_page_size: 100,
            appointment_max_page_size: 500,
            appointment_reuse_cancelled: true,
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
