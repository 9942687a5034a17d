use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::shared::{EventAction, RepositoryError};
use crate::reactive::AsyncResult;

use super::message::{InboundMessage, OutboundMessage};
use super::publisher::MessageProducer;

// ============================================================================
// Dead Letters
// ============================================================================
//
// Messages parked for manual replay:
// - producer side: a committed change whose announcement exhausted retries
// - consumer side: a message that kept failing after max redeliveries
//
// Replay re-sends the message unchanged; consumers are idempotent, so a
// duplicate delivery is harmless.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterSource {
    Producer,
    Consumer,
}

impl DeadLetterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterSource::Producer => "producer",
            DeadLetterSource::Consumer => "consumer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "producer" => Some(DeadLetterSource::Producer),
            "consumer" => Some(DeadLetterSource::Consumer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub action: EventAction,
    pub body: Option<String>,
    pub error: String,
    pub attempts: u32,
    pub source: DeadLetterSource,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn from_outbound(message: &OutboundMessage, error: impl Into<String>, attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            topic: message.topic.clone(),
            key: message.key.clone(),
            action: message.action,
            body: message.body.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()),
            error: error.into(),
            attempts,
            source: DeadLetterSource::Producer,
            first_failed_at: now,
            last_failed_at: now,
        }
    }

    /// Only messages with a key and a known action can be replayed, so
    /// anything else is not parked.
    pub fn from_inbound(
        message: &InboundMessage,
        error: impl Into<String>,
        attempts: u32,
        first_failed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let action = message.action().ok()?;
        let key = message.key.clone()?;

        Some(Self {
            id: Uuid::now_v7(),
            topic: message.topic.clone(),
            key,
            action,
            body: message.body.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()),
            error: error.into(),
            attempts,
            source: DeadLetterSource::Consumer,
            first_failed_at,
            last_failed_at: Utc::now(),
        })
    }

    pub fn to_outbound(&self) -> OutboundMessage {
        OutboundMessage {
            topic: self.topic.clone(),
            key: self.key.clone(),
            action: self.action,
            body: self.body.clone().map(String::into_bytes),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait DeadLetterStore: Send + Sync {
    fn park(&self, letter: DeadLetter) -> AsyncResult<(), RepositoryError>;

    /// Oldest first.
    fn list(&self, limit: u32) -> AsyncResult<Vec<DeadLetter>, RepositoryError>;

    fn remove(&self, id: Uuid) -> AsyncResult<bool, RepositoryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Re-send up to `limit` parked messages, removing each one that was
/// delivered. Messages that fail again stay parked.
pub async fn replay_dead_letters(
    store: &dyn DeadLetterStore,
    producer: &dyn MessageProducer,
    limit: u32,
) -> Result<ReplayReport, RepositoryError> {
    let letters = store.list(limit).await?;
    let mut report = ReplayReport::default();

    tracing::info!(count = letters.len(), "🔁 Replaying dead letters");

    for letter in letters {
        match producer.send(letter.to_outbound()).await {
            Ok(()) => {
                store.remove(letter.id).await?;
                report.delivered += 1;
                tracing::info!(
                    dead_letter_id = %letter.id,
                    topic = %letter.topic,
                    key = %letter.key,
                    "Dead letter delivered"
                );
            }
            Err(error) => {
                report.failed += 1;
                tracing::warn!(
                    dead_letter_id = %letter.id,
                    topic = %letter.topic,
                    error = %error,
                    "Dead letter replay failed, keeping it parked"
                );
            }
        }
    }

    Ok(report)
}
