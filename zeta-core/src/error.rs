//! Error types for ZETA

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain error kinds, as they appear in the HTTP status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    PermissionDenied,
    Unavailable,
    Internal,
}

/// Domain error: a kind plus a short client-facing detail message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZetaError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ZetaError {
    pub fn validation(detail: impl Into<String>) -> Self {
        ZetaError::Validation(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        ZetaError::NotFound(detail.into())
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        ZetaError::Conflict(detail.into())
    }

    pub fn permission_denied(detail: impl Into<String>) -> Self {
        ZetaError::PermissionDenied(detail.into())
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        ZetaError::Unavailable(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ZetaError::Internal(detail.into())
    }

    /// Error kind, used to pick the HTTP status code
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZetaError::Validation(_) => ErrorKind::Validation,
            ZetaError::NotFound(_) => ErrorKind::NotFound,
            ZetaError::Conflict(_) => ErrorKind::Conflict,
            ZetaError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ZetaError::Unavailable(_) => ErrorKind::Unavailable,
            ZetaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Client-facing detail message
    pub fn detail(&self) -> &str {
        match self {
            ZetaError::Validation(detail)
            | ZetaError::NotFound(detail)
            | ZetaError::Conflict(detail)
            | ZetaError::PermissionDenied(detail)
            | ZetaError::Unavailable(detail)
            | ZetaError::Internal(detail) => detail,
        }
    }
}

impl From<serde_json::Error> for ZetaError {
    fn from(err: serde_json::Error) -> Self {
        ZetaError::Internal(format!("serialization: {err}"))
    }
}
