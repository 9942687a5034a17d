use super::id::AggregateId;
use crate::reactive::{AsyncCollection, AsyncResult};

// ============================================================================
// Domain Failure Taxonomy
// ============================================================================
//
// Every orchestrator resolves to one of these named conditions. The HTTP
// boundary and the choreography handler each translate them on their own
// terms, so the variants must stay distinct:
//
// - `ReferenceNotFound`: the referenced aggregate does not exist
// - `ReferenceResolutionFailed`: we could not find out (remote outage)
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: AggregateId },

    #[error("{message}")]
    AlreadyInDesiredState { message: String },

    #[error("referenced {kind} {id} does not exist")]
    ReferenceNotFound { kind: &'static str, id: AggregateId },

    #[error("could not resolve {kind} {id}: {message}")]
    ReferenceResolutionFailed {
        kind: &'static str,
        id: AggregateId,
        message: String,
    },

    #[error("{message}")]
    PersistenceConflict { message: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("unexpected failure: {message}")]
    UnexpectedFailure { message: String },
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: AggregateId) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn already(message: impl Into<String>) -> Self {
        Self::AlreadyInDesiredState {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::PersistenceConflict {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedFailure {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyInDesiredState { .. } => "already_in_desired_state",
            Self::ReferenceNotFound { .. } => "reference_not_found",
            Self::ReferenceResolutionFailed { .. } => "reference_resolution_failed",
            Self::PersistenceConflict { .. } => "persistence_conflict",
            Self::InvalidInput { .. } => "invalid_input",
            Self::UnexpectedFailure { .. } => "unexpected_failure",
        }
    }
}

/// Orchestrator results.
pub type DomainResult<T> = AsyncResult<T, DomainError>;
pub type DomainCollection<T> = AsyncCollection<T, DomainError>;
