//! Validation errors shared by configs, secrets, and jobs.

use thiserror::Error;

/// Result type alias for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Input rejected before anything is queued or persisted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid deployment name: {0:?}")]
    InvalidName(String),

    #[error("deployment {0:?} has no image")]
    MissingImage(String),

    #[error("invalid secret key: {0:?}")]
    InvalidSecretKey(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),
}
