use serde::Deserialize;
use thiserror::Error;

/// SQLSTATE raised by Postgres when an exclusion constraint rejects a row.
pub const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl DatabaseError {
    /// True when the database refused the write because of a constraint
    /// (HTTP 409 from PostgREST).
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Api { status: 409, .. })
    }

    pub fn is_exclusion_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::Api { code: Some(code), .. } if code == EXCLUSION_VIOLATION
        )
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Build an error from a non-success PostgREST response.
pub(crate) fn from_response(status: u16, body: &str) -> DatabaseError {
    let parsed: Option<PostgrestErrorBody> = serde_json::from_str(body).ok();

    match status {
        401 | 403 => DatabaseError::Auth(body.to_string()),
        404 => DatabaseError::NotFound(body.to_string()),
        _ => {
            let (code, message) = match parsed {
                Some(err) => {
                    let message = match (err.message, err.details) {
                        (Some(m), Some(d)) => format!("{} ({})", m, d),
                        (Some(m), None) => m,
                        (None, Some(d)) => d,
                        (None, None) => body.to_string(),
                    };
                    (err.code, message)
                }
                None => (None, body.to_string()),
            };
            DatabaseError::Api { status, code, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_violation_is_a_conflict() {
        let body = r#"{"code":"23P01","details":"Key conflicts with existing key.","hint":null,"message":"conflicting key value violates exclusion constraint \"appointments_no_overlap\""}"#;
        let err = from_response(409, body);

        assert!(err.is_conflict());
        assert!(err.is_exclusion_violation());
        assert!(err.to_string().contains("appointments_no_overlap"));
    }

    #[test]
    fn auth_and_not_found_statuses() {
        assert!(matches!(from_response(401, "nope"), DatabaseError::Auth(_)));
        assert!(matches!(from_response(404, "gone"), DatabaseError::NotFound(_)));
    }

    #[test]
    fn unparseable_body_is_kept_verbatim() {
        match from_response(500, "upstream timeout") {
            DatabaseError::Api { status, code, message } => {
                assert_eq!(status, 500);
                assert!(code.is_none());
                assert_eq!(message, "upstream timeout");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
