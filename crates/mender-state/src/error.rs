//! Error types for Mender resource access.

use thiserror::Error;

/// Result type alias for resource port operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing cluster resources.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("invalid resource: {0}")]
    Invalid(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

impl StateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}
