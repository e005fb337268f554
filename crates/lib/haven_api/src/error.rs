//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// A field-level validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Validation error without field detail.
    pub fn validation(message: &str) -> Self {
        AppError::Validation {
            message: message.to_string(),
            errors: Vec::new(),
        }
    }
}

/// Uniform failure body: `{ "success": false, "message": ... }`, plus
/// field errors for 422.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m, None),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m, None),
            AppError::Validation { message, errors } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(errors))
            }
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, None),
            AppError::RateLimited(m) => (StatusCode::TOO_MANY_REQUESTS, m, None),
            AppError::Internal(detail) => {
                // The detail is logged, never sent to the client.
                tracing::error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };
        let body = Json(ErrorBody {
            success: false,
            message,
            errors,
        });
        (status, body).into_response()
    }
}

impl From<haven_core::store::StoreError> for AppError {
    fn from(e: haven_core::store::StoreError) -> Self {
        use haven_core::store::StoreError;
        match e {
            StoreError::Conflict(m) => AppError::Conflict(m),
            StoreError::Database(e) => AppError::Internal(e.to_string()),
            StoreError::Decode(m) => AppError::Internal(m),
        }
    }
}

impl From<haven_core::auth::AuthError> for AppError {
    fn from(e: haven_core::auth::AuthError) -> Self {
        use haven_core::auth::AuthError;
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            // Signature problems must never surface as 500s.
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            AuthError::StoreError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<haven_core::cache::CacheError> for AppError {
    fn from(e: haven_core::cache::CacheError) -> Self {
        AppError::Internal(e.to_string())
    }
}
