use serde::Serialize;
use uuid::Uuid;

/// Error taxonomy for the unit lifecycle engine.
///
/// Every failure carries the specific reason so the operator at the scanner
/// can decide whether to re-scan. `ConcurrentModification` is internal and
/// retried transparently by the services; callers see `Contention` once the
/// retry bound is exhausted.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Wrong location: {0}")]
    AtWrongLocation(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Contention: {0}")]
    Contention(String),

    #[error("Insufficient quantity: {0}")]
    InsufficientQuantity(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Whether the operation may be retried against a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrentModification(_))
    }

    /// Convenience constructor for a code that resolved to nothing.
    pub fn unknown_code(code: &str) -> Self {
        ServiceError::NotFound(format!("No inventory unit with code {}", code))
    }
}
