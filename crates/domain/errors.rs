use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy shared by the scheduling logic, the use cases and the HTTP layer.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("external service failure ({service}): {message}")]
    ExternalServiceFailure {
        service: &'static str,
        message: String,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        BookingError::NotFound { entity, id }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        BookingError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn external(service: &'static str, err: impl std::fmt::Display) -> Self {
        BookingError::ExternalServiceFailure {
            service,
            message: err.to_string(),
        }
    }

    /// Validation and state-machine failures are raised before any mutation and are never retried.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            BookingError::ExternalServiceFailure { .. } | BookingError::Internal(_)
        )
    }
}

pub type BookingResult<T> = std::result::Result<T, BookingError>;
