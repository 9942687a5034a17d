#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
#[cfg(test)]
use tokio::sync::Mutex;

use crate::domain::shared::PublishError;

use super::message::OutboundMessage;
use super::publisher::MessageProducer;

/// Producer for a service running without a broker: messages are logged and
/// dropped, nothing is retained.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProducer;

#[async_trait]
impl MessageProducer for LoggingProducer {
    async fn send(&self, message: OutboundMessage) -> Result<(), PublishError> {
        tracing::info!(
            topic = %message.topic,
            key = %message.key,
            action = %message.action,
            "No broker configured, message dropped"
        );
        Ok(())
    }
}

/// Recording producer for tests. Every delivered message is kept, in send
/// order.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryProducer {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

#[cfg(test)]
impl InMemoryProducer {
    /// Make every following send fail with a transport error.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Remove and return everything sent so far.
    pub async fn drain(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[cfg(test)]
#[async_trait]
impl MessageProducer for InMemoryProducer {
    async fn send(&self, message: OutboundMessage) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Transport {
                message: "in-memory broker unavailable".to_string(),
            });
        }

        tracing::debug!(
            topic = %message.topic,
            key = %message.key,
            action = %message.action,
            "Message delivered in-process"
        );
        self.sent.lock().await.push(message);
        Ok(())
    }
}
