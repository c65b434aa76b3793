use crate::{
    routes::path::PathError,
    services::{table::TableError, validation::ValidationError},
    xml,
};
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

/// Failures of the bucket and object services.
///
/// Validation and existence checks run before anything is mutated, so the
/// first four kinds never leave side effects behind. `Storage` is reserved for
/// failures after a mutation sequence started, including detected orphans.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket name `{name}` {reason}")]
    InvalidName {
        name: String,
        reason: ValidationError,
    },
    #[error("invalid object key `{key}`: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] TableError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn bucket_not_found(bucket: &str) -> Self {
        StoreError::NotFound(format!("bucket `{bucket}` does not exist"))
    }

    pub fn object_not_found(bucket: &str, key: &str) -> Self {
        StoreError::NotFound(format!("object `{key}` does not exist in bucket `{bucket}`"))
    }

    /// Wrap a failure that happened after a mutation sequence started.
    pub fn storage(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        StoreError::Storage(format!("{context}: {err}"))
    }
}

/// An error rendered as the XML `<Error>` envelope.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    /// Label written to `<StatusCode>`.
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, label and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", msg)
    }

    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} {}: {}", self.status.as_u16(), self.code, self.message);
        } else {
            tracing::debug!("{} {}: {}", self.status.as_u16(), self.code, self.message);
        }

        let body = xml::error_document(self.code, &self.message);
        (
            self.status,
            [(header::CONTENT_TYPE, xml::CONTENT_TYPE)],
            body,
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::InvalidName { .. } => {
                AppError::new(StatusCode::BAD_REQUEST, "InvalidBucketName", message)
            }
            StoreError::InvalidKey { .. } => {
                AppError::new(StatusCode::BAD_REQUEST, "InvalidObjectKey", message)
            }
            StoreError::Conflict(_) => AppError::new(StatusCode::CONFLICT, "Conflict", message),
            StoreError::NotFound(_) => AppError::new(StatusCode::NOT_FOUND, "NotFound", message),
            StoreError::Storage(_) | StoreError::Io(_) => AppError::internal(message),
        }
    }
}

impl From<PathError> for AppError {
    fn from(err: PathError) -> Self {
        AppError::bad_request(err.to_string())
    }
}
