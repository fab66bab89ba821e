use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized - credential rejected")]
    Unauthorized,

    #[error("Identity endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed credential: {0}")]
    MalformedCredential(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

impl AuthError {
    /// Transient failures keep the session pending and are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Unreachable(_))
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            408 | 429 | 500..=599 => AuthError::Unreachable(format!(
                "status {}: {}",
                status,
                Self::truncate_body(body)
            )),
            _ => AuthError::Unauthorized,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        // The server answered, but not with anything that identifies the user
        if err.is_decode() {
            warn!(error = %err, "Undecodable auth response");
            return AuthError::Unauthorized;
        }
        AuthError::Unreachable(err.to_string())
    }
}
