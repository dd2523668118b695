pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Body of every error response.
///
/// ```json
/// {
///   "code": 1006,
///   "error": "INVALID_UPLOAD",
///   "message": "Only JPEG, PNG and GIF images are accepted",
///   "details": null
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Per-field validation failures, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type that converts into a JSON error response.
///
/// Client failures map to 4xx. Every other failure is a 500, including an
/// unreachable database.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidArgument(_)
            | AppError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Io(_) | AppError::Database(_) | AppError::DatabaseUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Io(_) => ErrorCode::IoError,
            AppError::ValidationError(_) => ErrorCode::ValidationError,
            AppError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AppError::InvalidUpload(_) => ErrorCode::InvalidUpload,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseUnavailable(_) => ErrorCode::DatabaseUnavailable,
        }
    }

    /// Log at a level matching the failure class.
    fn log(&self, code: ErrorCode) {
        let error_code = code.code();
        match self {
            AppError::Io(_) | AppError::Database(_) => {
                tracing::error!(error_code, error = %self, "Request failed");
            }
            AppError::DatabaseUnavailable(_) => {
                tracing::warn!(error_code, error = %self, "Dependency unavailable");
            }
            _ => {
                tracing::info!(error_code, error = %self, "Client error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error_code();
        self.log(code);

        // Server-side failures never leak driver or filesystem detail.
        let (message, details) = match self {
            AppError::ValidationError(e) => (
                code.default_message().to_string(),
                serde_json::to_value(&e).ok(),
            ),
            AppError::InvalidArgument(msg)
            | AppError::InvalidUpload(msg)
            | AppError::NotFound(msg) => (msg, None),
            _ => (code.default_message().to_string(), None),
        };

        let body = Json(ErrorResponse {
            code: code.code(),
            error: code.as_str().to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}
