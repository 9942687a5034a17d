use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::OwnerResolutionCache;
use crate::domain::shared::{CascadeOnRemoteDelete, DomainError, EventAction};
use crate::metrics::Metrics;

use super::message::InboundMessage;

// ============================================================================
// Choreography Handler
// ============================================================================
//
// Per consumed message:
//
//   Received -> Dispatched -> Applied | Failed
//   Received -> Ignored
//
// Only DELETE is relevant to the downstream services. Anything else, or a
// message that cannot be dispatched at all (no action header, key that is
// not an id), is ignored: redelivering it could never make it succeed.
//
// The cascade is "ensure absent", so NotFound and AlreadyInDesiredState
// count as applied and a redelivered DELETE converges to Applied again.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Applied { removed: usize },
    Ignored { reason: String },
    Failed { error: DomainError },
}

impl MessageOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Applied { .. } => "applied",
            MessageOutcome::Ignored { .. } => "ignored",
            MessageOutcome::Failed { .. } => "failed",
        }
    }

    /// Whether the offset can be committed. A failed message is left for
    /// redelivery.
    pub fn acknowledges(&self) -> bool {
        !matches!(self, MessageOutcome::Failed { .. })
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Topic this handler consumes.
    fn topic(&self) -> &str;

    async fn handle(&self, message: &InboundMessage) -> MessageOutcome;
}

/// Converges local state when an upstream aggregate is deleted.
pub struct DeleteChoreography {
    topic: &'static str,
    cascade: Arc<dyn CascadeOnRemoteDelete>,
    cache: Option<OwnerResolutionCache>,
    metrics: Option<Arc<Metrics>>,
}

impl DeleteChoreography {
    pub fn new(topic: &'static str, cascade: Arc<dyn CascadeOnRemoteDelete>) -> Self {
        Self {
            topic,
            cascade,
            cache: None,
            metrics: None,
        }
    }

    /// Invalidate this cache's entry for the deleted id before cascading.
    pub fn with_cache(mut self, cache: OwnerResolutionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn dispatch(&self, message: &InboundMessage) -> MessageOutcome {
        let action = match message.action() {
            Ok(action) => action,
            Err(unknown) => {
                return MessageOutcome::Ignored {
                    reason: unknown.to_string(),
                }
            }
        };

        if action != EventAction::Delete {
            return MessageOutcome::Ignored {
                reason: format!("{action} is not relevant here"),
            };
        }

        let remote_id = match message.aggregate_id() {
            Ok(id) => id,
            Err(invalid) => {
                return MessageOutcome::Ignored {
                    reason: invalid.to_string(),
                }
            }
        };

        tracing::debug!(
            topic = %message.topic,
            aggregate_id = %remote_id,
            "Dispatched remote delete"
        );

        if let Some(cache) = &self.cache {
            if let Err(error) = cache.invalidate(remote_id).await {
                return MessageOutcome::Failed { error };
            }
        }

        match self.cascade.on_remote_delete(remote_id).await {
            Ok(report) => MessageOutcome::Applied {
                removed: report.removed,
            },
            Err(DomainError::NotFound { .. }) | Err(DomainError::AlreadyInDesiredState { .. }) => {
                MessageOutcome::Applied { removed: 0 }
            }
            Err(error) => MessageOutcome::Failed { error },
        }
    }
}

#[async_trait]
impl MessageHandler for DeleteChoreography {
    fn topic(&self) -> &str {
        self.topic
    }

    async fn handle(&self, message: &InboundMessage) -> MessageOutcome {
        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            key = ?message.key,
            action = ?message.action,
            "Received message"
        );

        let outcome = self.dispatch(message).await;

        match &outcome {
            MessageOutcome::Applied { removed } => tracing::info!(
                topic = %message.topic,
                key = ?message.key,
                removed = *removed,
                "✅ Remote delete applied"
            ),
            MessageOutcome::Ignored { reason } => tracing::debug!(
                topic = %message.topic,
                key = ?message.key,
                reason = %reason,
                "Message ignored"
            ),
            MessageOutcome::Failed { error } => tracing::error!(
                topic = %message.topic,
                key = ?message.key,
                error = %error,
                "Remote delete failed, awaiting redelivery"
            ),
        }

        if let Some(metrics) = &self.metrics {
            let action = message.action.as_deref().unwrap_or("none");
            metrics.record_consumed(&message.topic, action, outcome.label());
        }

        outcome
    }
}
