use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix::Recipient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};

use crate::actors::{HealthStatus, UpdateHealth};
use crate::domain::shared::PublishError;
use crate::metrics::Metrics;
use crate::utils::{BreakerState, CircuitBreaker, CircuitBreakerConfig, RetryPolicy, Tripped};

use super::choreography::{MessageHandler, MessageOutcome};
use super::dead_letter::{DeadLetter, DeadLetterStore};
use super::message::{InboundMessage, OutboundMessage, ACTION_HEADER};
use super::publisher::MessageProducer;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Kafka Producer
// ============================================================================
//
// Each send goes through the circuit breaker, and transient failures are
// retried with exponential backoff. An open circuit is not retried.
//
// ============================================================================

pub struct KafkaProducer {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl KafkaProducer {
    pub fn new(brokers: &str) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .create()?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
            probe_successes: 3,
        };

        tracing::info!(brokers = %brokers, "📡 Kafka producer created");

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new("kafka_producer", cb_config),
            retry: RetryPolicy::for_publishing(),
        })
    }

    /// Shared handle on the breaker, for health reporting.
    pub fn circuit_breaker(&self) -> CircuitBreaker {
        self.circuit_breaker.clone()
    }

    pub async fn breaker_state(&self) -> BreakerState {
        self.circuit_breaker.state().await
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        let headers = OwnedHeaders::new().insert(Header {
            key: ACTION_HEADER,
            value: Some(message.action.as_str()),
        });

        let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(&message.topic)
            .key(message.key.as_str())
            .headers(headers);
        if let Some(body) = &message.body {
            record = record.payload(body.as_slice());
        }

        self.producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(e, _)| PublishError::Transport {
                message: format!("Kafka send error: {e}"),
            })
    }

    async fn guarded_deliver(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        match self.circuit_breaker.guard(self.deliver(message)).await {
            Ok(()) => Ok(()),
            Err(Tripped::Open) => Err(PublishError::CircuitOpen),
            Err(Tripped::Failed(error)) => Err(error),
        }
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(&self, message: OutboundMessage) -> Result<(), PublishError> {
        let result = self
            .retry
            .run(|_attempt| self.guarded_deliver(&message), PublishError::is_transient)
            .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    topic = %message.topic,
                    key = %message.key,
                    action = %message.action,
                    "Published to Kafka"
                );
                Ok(())
            }
            Err(exhausted) => {
                if exhausted.last_error == PublishError::CircuitOpen {
                    tracing::error!(
                        topic = %message.topic,
                        "Circuit breaker open - Kafka unavailable"
                    );
                }
                Err(exhausted.last_error)
            }
        }
    }
}

// ============================================================================
// Kafka Choreography Consumer
// ============================================================================
//
// Offsets are committed manually:
// - Applied / Ignored      -> commit
// - Failed                 -> seek back to the same offset after a backoff
// - Failed max_attempts    -> park as dead letter, then commit
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct ConsumerSettings {
    pub brokers: String,
    pub group_id: String,
    pub max_attempts: u32,
    pub backoff: Duration,
}

pub struct KafkaChoreographyConsumer {
    consumer: StreamConsumer,
    handler: Arc<dyn MessageHandler>,
    dead_letters: Option<Arc<dyn DeadLetterStore>>,
    metrics: Option<Arc<Metrics>>,
    max_attempts: u32,
    backoff: Duration,
}

/// What the consume loop does with a message once its handler has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryStep {
    /// Handled or deliberately skipped; move past it.
    Commit,
    /// Seek back to the message after `delay`.
    Redeliver { attempts: u32, delay: Duration },
    /// Out of attempts: dead-letter it, then move past it.
    ParkAndCommit {
        attempts: u32,
        first_failed_at: DateTime<Utc>,
    },
}

/// Failed deliveries per (partition, offset).
struct RedeliveryTracker {
    max_attempts: u32,
    backoff: Duration,
    failures: HashMap<(i32, i64), (u32, DateTime<Utc>)>,
}

impl RedeliveryTracker {
    fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            failures: HashMap::new(),
        }
    }

    /// Backoff grows linearly with the number of failed attempts.
    fn next_step(&mut self, partition: i32, offset: i64, outcome: &MessageOutcome) -> DeliveryStep {
        if outcome.acknowledges() {
            self.failures.remove(&(partition, offset));
            return DeliveryStep::Commit;
        }

        let entry = self
            .failures
            .entry((partition, offset))
            .or_insert((0, Utc::now()));
        entry.0 += 1;
        let (attempts, first_failed_at) = *entry;

        if attempts >= self.max_attempts {
            self.failures.remove(&(partition, offset));
            return DeliveryStep::ParkAndCommit {
                attempts,
                first_failed_at,
            };
        }

        DeliveryStep::Redeliver {
            attempts,
            delay: self.backoff.saturating_mul(attempts),
        }
    }
}

impl KafkaChoreographyConsumer {
    pub fn new(settings: &ConsumerSettings, handler: Arc<dyn MessageHandler>) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[handler.topic()])?;

        tracing::info!(
            topic = %handler.topic(),
            group_id = %settings.group_id,
            "📥 Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            handler,
            dead_letters: None,
            metrics: None,
            max_attempts: settings.max_attempts,
            backoff: settings.backoff,
        })
    }

    pub fn with_dead_letters(mut self, store: Arc<dyn DeadLetterStore>) -> Self {
        self.dead_letters = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn topic(&self) -> String {
        self.handler.topic().to_string()
    }

    /// Consume until the task is aborted.
    pub async fn run(self, health: Recipient<UpdateHealth>) {
        let component = format!("consumer:{}", self.handler.topic());
        let mut redeliveries = RedeliveryTracker::new(self.max_attempts, self.backoff);

        health.do_send(UpdateHealth {
            component: component.clone(),
            status: HealthStatus::Healthy,
            details: Some("consuming".to_string()),
        });

        loop {
            let message = match self.consumer.recv().await {
                Ok(borrowed) => to_inbound(&borrowed),
                Err(e) => {
                    tracing::error!(error = %e, "Kafka receive error");
                    health.do_send(UpdateHealth {
                        component: component.clone(),
                        status: HealthStatus::Degraded(e.to_string()),
                        details: None,
                    });
                    tokio::time::sleep(self.backoff).await;
                    continue;
                }
            };

            let outcome = self.handler.handle(&message).await;

            let (attempts, delay) = match redeliveries.next_step(message.partition, message.offset, &outcome) {
                DeliveryStep::Commit => {
                    self.commit(&message);
                    continue;
                }
                DeliveryStep::ParkAndCommit {
                    attempts,
                    first_failed_at,
                } => {
                    self.park(&message, &outcome, attempts, first_failed_at).await;
                    self.commit(&message);
                    continue;
                }
                DeliveryStep::Redeliver { attempts, delay } => (attempts, delay),
            };

            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                attempts,
                "Redelivering message after backoff"
            );
            tokio::time::sleep(delay).await;

            if let Err(e) = self.consumer.seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                SEEK_TIMEOUT,
            ) {
                tracing::error!(
                    error = %e,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Seek failed, message will be redelivered after rebalance"
                );
            }
        }
    }

    fn commit(&self, message: &InboundMessage) {
        let mut offsets = TopicPartitionList::new();
        let committed = offsets
            .add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
            .and_then(|()| self.consumer.commit(&offsets, CommitMode::Async));

        if let Err(e) = committed {
            tracing::warn!(
                error = %e,
                topic = %message.topic,
                offset = message.offset,
                "Offset commit failed"
            );
        }
    }

    async fn park(
        &self,
        message: &InboundMessage,
        outcome: &MessageOutcome,
        attempts: u32,
        first_failed_at: DateTime<Utc>,
    ) {
        let error = match outcome {
            MessageOutcome::Failed { error } => error.to_string(),
            other => other.label().to_string(),
        };

        tracing::error!(
            topic = %message.topic,
            key = ?message.key,
            attempts,
            error = %error,
            "💀 Giving up on message after max redeliveries"
        );

        let (Some(store), Some(letter)) = (
            &self.dead_letters,
            DeadLetter::from_inbound(message, error, attempts, first_failed_at),
        ) else {
            return;
        };

        match store.park(letter).await {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_dead_letter(&message.topic, "consumer");
                }
            }
            Err(e) => tracing::error!(error = %e, "Dead letter store unavailable, message dropped"),
        }
    }
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    let action = message.headers().and_then(|headers| {
        headers
            .iter()
            .find(|header| header.key == ACTION_HEADER)
            .and_then(|header| header.value)
            .map(|value| String::from_utf8_lossy(value).into_owned())
    });

    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
        action,
        body: message.payload().map(<[u8]>::to_vec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::shared::DomainError;

    const BACKOFF: Duration = Duration::from_millis(100);

    fn failed() -> MessageOutcome {
        MessageOutcome::Failed {
            error: DomainError::unexpected("database unavailable"),
        }
    }

    #[test]
    fn test_applied_and_ignored_commit() {
        let mut tracker = RedeliveryTracker::new(3, BACKOFF);
        assert_eq!(
            tracker.next_step(0, 1, &MessageOutcome::Applied { removed: 2 }),
            DeliveryStep::Commit
        );
        assert_eq!(
            tracker.next_step(
                0,
                2,
                &MessageOutcome::Ignored {
                    reason: "not a DELETE".to_string()
                }
            ),
            DeliveryStep::Commit
        );
    }

    #[test]
    fn test_failures_below_max_attempts_redeliver_with_growing_backoff() {
        let mut tracker = RedeliveryTracker::new(3, BACKOFF);
        assert_eq!(
            tracker.next_step(0, 10, &failed()),
            DeliveryStep::Redeliver {
                attempts: 1,
                delay: BACKOFF
            }
        );
        assert_eq!(
            tracker.next_step(0, 10, &failed()),
            DeliveryStep::Redeliver {
                attempts: 2,
                delay: BACKOFF * 2
            }
        );
    }

    #[test]
    fn test_failure_at_max_attempts_parks_and_commits() {
        let mut tracker = RedeliveryTracker::new(3, BACKOFF);
        tracker.next_step(0, 10, &failed());
        tracker.next_step(0, 10, &failed());

        let step = tracker.next_step(0, 10, &failed());
        assert!(matches!(step, DeliveryStep::ParkAndCommit { attempts: 3, .. }));

        // A later delivery of the same offset starts a fresh count.
        assert!(matches!(tracker.next_step(0, 10, &failed()), DeliveryStep::Redeliver { attempts: 1, .. }));
    }

    #[test]
    fn test_single_attempt_parks_immediately() {
        let mut tracker = RedeliveryTracker::new(0, BACKOFF);
        assert!(matches!(tracker.next_step(0, 5, &failed()), DeliveryStep::ParkAndCommit { attempts: 1, .. }));
    }

    #[test]
    fn test_attempts_are_counted_per_partition_and_offset() {
        let mut tracker = RedeliveryTracker::new(5, BACKOFF);
        tracker.next_step(0, 10, &failed());
        tracker.next_step(0, 10, &failed());

        assert!(matches!(tracker.next_step(1, 10, &failed()), DeliveryStep::Redeliver { attempts: 1, .. }));

        assert_eq!(
            tracker.next_step(0, 10, &MessageOutcome::Applied { removed: 0 }),
            DeliveryStep::Commit
        );
        assert!(matches!(tracker.next_step(0, 10, &failed()), DeliveryStep::Redeliver { attempts: 1, .. }));
    }
}
