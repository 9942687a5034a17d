use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::shared::{AggregateId, DomainEvent, EventAction, InvalidAggregateId, PublishError, UnknownAction};

// ============================================================================
// Wire Messages
// ============================================================================
//
// Key    = aggregate id (string form)
// Header = `action` -> CREATE | UPDATE | DELETE
// Body   = JSON { occurred_at, ...snapshot } for CREATE/UPDATE, absent for DELETE
//
// ============================================================================

pub const ACTION_HEADER: &str = "action";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: String,
    pub action: EventAction,
    pub body: Option<Vec<u8>>,
}

#[derive(Serialize)]
struct Envelope<'a, P> {
    occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: &'a P,
}

impl OutboundMessage {
    pub fn encode<P: Serialize>(topic: &str, event: &DomainEvent<P>, action: EventAction) -> Result<Self, PublishError> {
        let body = if action.carries_body() {
            let snapshot = event.snapshot().ok_or_else(|| PublishError::Serialization {
                message: format!("{action} event for {} carries no snapshot", event.aggregate_id()),
            })?;

            let envelope = Envelope {
                occurred_at: event.occurred_at(),
                snapshot,
            };
            let bytes = serde_json::to_vec(&envelope).map_err(|e| PublishError::Serialization {
                message: e.to_string(),
            })?;
            Some(bytes)
        } else {
            None
        };

        Ok(Self {
            topic: topic.to_string(),
            key: event.aggregate_id().to_string(),
            action,
            body,
        })
    }
}

/// A consumed message, detached from the broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub action: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl InboundMessage {
    /// The action header, if present and known.
    pub fn action(&self) -> Result<EventAction, UnknownAction> {
        match self.action.as_deref() {
            Some(raw) => raw.parse(),
            None => Err(UnknownAction(String::new())),
        }
    }

    pub fn aggregate_id(&self) -> Result<AggregateId, InvalidAggregateId> {
        AggregateId::parse(self.key.as_deref().unwrap_or_default())
    }
}

impl From<OutboundMessage> for InboundMessage {
    fn from(message: OutboundMessage) -> Self {
        Self {
            topic: message.topic,
            partition: 0,
            offset: 0,
            key: Some(message.key),
            action: Some(message.action.as_str().to_string()),
            body: message.body,
        }
    }
}
