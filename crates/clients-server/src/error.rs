//! Error types for the clients server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registration_saga::RegistrationError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Registration(err) => match err {
                RegistrationError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                RegistrationError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                RegistrationError::StoreWrite { .. } => {
                    (StatusCode::BAD_GATEWAY, "STORE_WRITE_ERROR")
                }
                RegistrationError::Notification { .. } => {
                    (StatusCode::BAD_GATEWAY, "NOTIFICATION_ERROR")
                }
                RegistrationError::StoreRead(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
                }
            },
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            ApiError::Registration(err) => {
                if let Some(rollback) = err.rollback().filter(|r| r.has_residue()) {
                    error!(error = %err, ?rollback, "Registration left records behind");
                }
                err.user_message()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            ok: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
