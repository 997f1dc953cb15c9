//! Error types for the service core and the HTTP boundary.
//!
//! - [`StorageError`] - persistent store failures other than the uniqueness signal
//! - [`ShortenerError`] - everything the shortening service reports to its caller
//! - [`AppError`] - JSON error responses returned by HTTP handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::utils::url_validator::UrlValidationError;

/// Persistent store failure.
///
/// A uniqueness violation on insert is not represented here; it is reported as
/// [`crate::domain::entities::InsertOutcome::AlreadyExists`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures reported by [`crate::application::services::ShortenerService`].
#[derive(Debug, thiserror::Error)]
pub enum ShortenerError {
    /// The long URL is not an absolute http(s) URL with a host.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    /// The derived code is already taken by a different long URL.
    #[error("short code '{short_code}' is already bound to a different URL")]
    CodeCollision { short_code: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error payload.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug)]
pub enum AppError {
    Validation { message: String, details: Value },
    NotFound { message: String, details: Value },
    Conflict { message: String, details: Value },
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    fn parts(self) -> (StatusCode, ErrorInfo) {
        let (status, code, message, details) = match self {
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
            ),
            AppError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
            AppError::Conflict { message, details } => {
                (StatusCode::CONFLICT, "conflict", message, details)
            }
            AppError::Internal { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                details,
            ),
        };

        (
            status,
            ErrorInfo {
                code,
                message,
                details,
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, info) = self.parts();
        (status, Json(ErrorBody { error: info })).into_response()
    }
}

impl From<ShortenerError> for AppError {
    fn from(err: ShortenerError) -> Self {
        match err {
            ShortenerError::InvalidUrl(reason) => AppError::bad_request(
                "Invalid URL",
                json!({ "reason": reason.to_string() }),
            ),
            ShortenerError::CodeCollision { short_code } => AppError::conflict(
                "Short code is already bound to a different URL",
                json!({ "short_code": short_code }),
            ),
            ShortenerError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                AppError::internal("Database error", json!({}))
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::bad_request(
            "Request validation failed",
            json!({ "reason": errors.to_string() }),
        )
    }
}
