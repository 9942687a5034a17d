use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::AggregateId;

// ============================================================================
// Domain Events and the Action Discriminator
// ============================================================================
//
// A `DomainEvent` is produced at the moment a state transition commits
// locally. Create/update events carry a snapshot of the aggregate's public
// projection; delete events only carry the identity, because the aggregate no
// longer exists.
//
// The action (CREATE / UPDATE / DELETE) travels out-of-band as message
// metadata so consumers can dispatch without touching the body.
//
// ============================================================================

pub const IDENTITY_TOPIC: &str = "identity";
pub const PET_TOPIC: &str = "pet";
pub const VET_TOPIC: &str = "vet";

#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent<P> {
    aggregate_id: AggregateId,
    occurred_at: DateTime<Utc>,
    snapshot: Option<P>,
}

impl<P> DomainEvent<P> {
    /// Event for a create or update, carrying the projection as committed.
    pub fn with_snapshot(aggregate_id: AggregateId, snapshot: P) -> Self {
        Self {
            aggregate_id,
            occurred_at: Utc::now(),
            snapshot: Some(snapshot),
        }
    }

    pub fn deleted(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id,
            occurred_at: Utc::now(),
            snapshot: None,
        }
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn snapshot(&self) -> Option<&P> {
        self.snapshot.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventAction {
    Create,
    Update,
    Delete,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Create => "CREATE",
            EventAction::Update => "UPDATE",
            EventAction::Delete => "DELETE",
        }
    }

    /// Only create and update messages carry a body.
    pub fn carries_body(&self) -> bool {
        !matches!(self, EventAction::Delete)
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CREATE" => Ok(EventAction::Create),
            "UPDATE" => Ok(EventAction::Update),
            "DELETE" => Ok(EventAction::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action discriminator: {0:?}")]
pub struct UnknownAction(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_event_has_no_snapshot() {
        let id = AggregateId::new();
        let event = DomainEvent::<String>::deleted(id);
        assert_eq!(event.aggregate_id(), id);
        assert!(event.snapshot().is_none());
    }

    #[test]
    fn test_action_parses_wire_values() {
        assert_eq!("CREATE".parse::<EventAction>().unwrap(), EventAction::Create);
        assert_eq!("UPDATE".parse::<EventAction>().unwrap(), EventAction::Update);
        assert_eq!("DELETE".parse::<EventAction>().unwrap(), EventAction::Delete);
        assert_eq!(
            "delete".parse::<EventAction>(),
            Err(UnknownAction("delete".to_string()))
        );
    }

    #[test]
    fn test_only_delete_is_bodyless() {
        assert!(EventAction::Create.carries_body());
        assert!(EventAction::Update.carries_body());
        assert!(!EventAction::Delete.carries_body());
    }
}
