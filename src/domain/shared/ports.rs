use crate::reactive::AsyncResult;

use super::errors::{DomainError, DomainResult};
use super::events::{DomainEvent, EventAction};
use super::id::AggregateId;
use super::projection::OwnerProjection;

// ============================================================================
// Cross-cutting Ports
// ============================================================================
//
// Output ports shared by several aggregates, with one strongly typed error
// per port. Adapters map their failures into these variants; orchestrators
// translate them into the domain taxonomy.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository connection failed: {message}")]
    Connection { message: String },

    #[error("repository query failed: {message}")]
    Query { message: String },

    #[error("repository write conflict: {message}")]
    Conflict { message: String },
}

impl RepositoryError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict { message } => DomainError::PersistenceConflict { message },
            other => DomainError::unexpected(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("lookup transport failed: {message}")]
    Transport { message: String },

    #[error("lookup returned status {status}")]
    Protocol { status: u16 },

    #[error("lookup response could not be decoded: {message}")]
    Decode { message: String },
}

impl LookupError {
    /// A lookup failure is never "does not exist"; it is always "could not
    /// check".
    pub fn into_domain(self, kind: &'static str, id: AggregateId) -> DomainError {
        DomainError::ReferenceResolutionFailed {
            kind,
            id,
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("projection store unavailable: {message}")]
    Unavailable { message: String },

    #[error("projection store entry is corrupt: {message}")]
    Corrupt { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("event body could not be serialized: {message}")]
    Serialization { message: String },

    #[error("broker rejected or lost the message: {message}")]
    Transport { message: String },

    #[error("publisher circuit breaker is open")]
    CircuitOpen,
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Transport { .. })
    }
}

impl From<PublishError> for DomainError {
    fn from(error: PublishError) -> Self {
        DomainError::unexpected(format!("state committed but not announced: {error}"))
    }
}

/// Announces committed state changes on the aggregate's topic.
///
/// Called from an orchestrator's post-commit step only.
pub trait EventPublishPort<P>: Send + Sync {
    fn publish(&self, event: DomainEvent<P>, action: EventAction) -> AsyncResult<(), PublishError>;
}

/// Post-commit step shared by every orchestrator: announce the change, then
/// hand back the committed value.
///
/// A failed announcement does not undo the commit. It surfaces as
/// `UnexpectedFailure` so the caller can see the change went unannounced.
pub fn announce_committed<P, T>(
    publisher: &dyn EventPublishPort<P>,
    event: DomainEvent<P>,
    action: EventAction,
    committed: T,
) -> DomainResult<T>
where
    P: Send + 'static,
    T: Send + 'static,
{
    let aggregate_id = event.aggregate_id();

    publisher
        .publish(event, action)
        .map_err(move |error| {
            tracing::error!(
                aggregate_id = %aggregate_id,
                action = %action,
                error = %error,
                "State committed but not announced"
            );
            DomainError::from(error)
        })
        .map(move |()| committed)
}

/// Remote lookup of an identity owned by another service.
///
/// `Ok(None)` means the remote service answered and the identity does not
/// exist; `Err` means the question could not be answered.
#[cfg_attr(test, mockall::automock)]
pub trait OwnerLookup: Send + Sync {
    fn lookup(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, LookupError>;
}

/// Outcome of converging local state after a remote aggregate was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeReport {
    pub removed: usize,
}

/// Local reaction to a remote DELETE. Only the choreography handler calls
/// this, and it must be safe to run any number of times for the same id.
pub trait CascadeOnRemoteDelete: Send + Sync {
    fn on_remote_delete(&self, remote_id: AggregateId) -> DomainResult<CascadeReport>;
}
