//! Event domain error types

use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use mongodb::error::ErrorKind;
use thiserror::Error;
use validator::ValidationErrors;

/// Result type for event operations
pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    /// One or more fields are missing, malformed or out of range
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Malformed or missing query parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Uploaded file has the wrong type or size
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("{0}")]
    NotFound(String),

    /// The database rejected or failed the operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// The database could not be reached
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Blob store filesystem failure
    #[error("Blob store error: {0}")]
    Blob(#[from] std::io::Error),
}

impl EventError {
    pub fn not_found() -> Self {
        Self::NotFound("Event not found".to_string())
    }
}

impl From<mongodb::error::Error> for EventError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => Self::StorageUnavailable(err.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Validation(errors) => AppError::ValidationError(errors),
            EventError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            EventError::InvalidUpload(msg) => AppError::InvalidUpload(msg),
            EventError::NotFound(msg) => AppError::NotFound(msg),
            EventError::Storage(msg) => AppError::Database(msg),
            EventError::StorageUnavailable(msg) => AppError::DatabaseUnavailable(msg),
            EventError::Blob(e) => AppError::Io(e),
        }
    }
}

impl IntoResponse for EventError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
