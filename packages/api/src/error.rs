//! Error types for the authentication routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider rejected the credential, was unreachable, or
    /// answered with something other than `{ "email": string }`.
    #[error("Identity verification failed: {0}")]
    IdentityVerification(String),

    /// More than one user row carries the same email.
    #[error("multiple users found with the same email")]
    DuplicateUser,

    /// Database connection or query error
    #[error("Store error: {0}")]
    Store(String),

    /// Session load or save error
    #[error("Session error: {0}")]
    Session(String),

    /// Request did not satisfy the authentication precondition
    #[error("Missing or malformed Authorization header")]
    Unauthorized,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Store(e.to_string())
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AuthError::Session(e.to_string())
    }
}

impl AuthError {
    /// HTTP status the transport answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
        });
        (status, Json(body)).into_response()
    }
}
