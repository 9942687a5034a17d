use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::shared::{DomainEvent, EventAction, EventPublishPort, PublishError};
use crate::metrics::Metrics;
use crate::reactive::AsyncResult;

use super::dead_letter::{DeadLetter, DeadLetterStore};
use super::message::OutboundMessage;

// ============================================================================
// Event Publisher
// ============================================================================
//
// Serializes a domain event plus its action and hands it to the broker,
// keyed by aggregate id, on the aggregate's fixed topic.
//
// Called only after the local change committed. A failed announcement is
// parked as a dead letter and still reported to the caller: the change stays
// committed, but "committed, not announced" must be observable.
//
// ============================================================================

/// Raw transport to the broker.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), PublishError>;
}

pub struct TopicPublisher {
    topic: &'static str,
    producer: Arc<dyn MessageProducer>,
    dead_letters: Option<Arc<dyn DeadLetterStore>>,
    metrics: Option<Arc<Metrics>>,
}

impl TopicPublisher {
    pub fn new(topic: &'static str, producer: Arc<dyn MessageProducer>) -> Self {
        Self {
            topic,
            producer,
            dead_letters: None,
            metrics: None,
        }
    }

    pub fn with_dead_letters(mut self, store: Arc<dyn DeadLetterStore>) -> Self {
        self.dead_letters = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }
}

impl<P> EventPublishPort<P> for TopicPublisher
where
    P: Serialize + Send + Sync + 'static,
{
    fn publish(&self, event: DomainEvent<P>, action: EventAction) -> AsyncResult<(), PublishError> {
        let message = match OutboundMessage::encode(self.topic, &event, action) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(
                    topic = %self.topic,
                    aggregate_id = %event.aggregate_id(),
                    error = %error,
                    "Event could not be encoded"
                );
                return AsyncResult::error(error);
            }
        };

        let topic = self.topic;
        let producer = self.producer.clone();
        let dead_letters = self.dead_letters.clone();
        let metrics = self.metrics.clone();

        AsyncResult::new(async move {
            match producer.send(message.clone()).await {
                Ok(()) => {
                    if let Some(metrics) = &metrics {
                        metrics.record_published(topic, action.as_str());
                    }
                    tracing::debug!(
                        topic = %topic,
                        key = %message.key,
                        action = %action,
                        "📤 Event published"
                    );
                    Ok(())
                }
                Err(error) => {
                    if let Some(metrics) = &metrics {
                        metrics.record_publish_failure(topic);
                    }
                    tracing::error!(
                        topic = %topic,
                        key = %message.key,
                        action = %action,
                        error = %error,
                        "Committed change could not be announced"
                    );

                    if let Some(store) = dead_letters {
                        let letter = DeadLetter::from_outbound(&message, error.to_string(), 1);
                        match store.park(letter).await {
                            Ok(()) => {
                                if let Some(metrics) = &metrics {
                                    metrics.record_dead_letter(topic, "producer");
                                }
                                tracing::warn!(
                                    topic = %topic,
                                    key = %message.key,
                                    "💀 Announcement parked as dead letter"
                                );
                            }
                            Err(park_error) => {
                                tracing::error!(
                                    topic = %topic,
                                    key = %message.key,
                                    error = %park_error,
                                    "Announcement lost: dead letter store unavailable"
                                );
                            }
                        }
                    }

                    Err(error)
                }
            }
        })
    }
}
