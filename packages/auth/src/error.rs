// ABOUTME: Error types for OAuth state management operations
// ABOUTME: Distinguishes client-facing CSRF failures from internal storage errors

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    /// State token unknown, already consumed, or bound to a different
    /// provider. The categories are deliberately merged so the error cannot
    /// be used as an oracle for which check failed.
    #[error("Invalid state parameter")]
    InvalidState,

    /// State token existed and matched the provider but its TTL has passed.
    #[error("State parameter has expired")]
    StateExpired,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("PKCE error: {0}")]
    Pkce(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// HTTP status the API layer should respond with for this error.
    ///
    /// CSRF validation failures are client errors the caller recovers from by
    /// restarting the flow; everything else is an internal failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidState | Self::StateExpired => 403,
            _ => 500,
        }
    }
}
