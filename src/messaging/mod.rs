// ============================================================================
// Messaging - broker boundary
// ============================================================================
//
// Outbound: TopicPublisher (EventPublishPort) -> MessageProducer
//           (KafkaProducer, or LoggingProducer when no broker is configured)
// Inbound:  KafkaChoreographyConsumer -> MessageHandler (DeleteChoreography)
//
// ============================================================================

pub mod choreography;
#[cfg(test)]
mod convergence_tests;
pub mod dead_letter;
pub mod kafka;
pub mod memory;
pub mod message;
pub mod publisher;

pub use choreography::{DeleteChoreography, MessageHandler, MessageOutcome};
pub use dead_letter::{replay_dead_letters, DeadLetter, DeadLetterSource, DeadLetterStore, ReplayReport};
pub use kafka::{ConsumerSettings, KafkaChoreographyConsumer, KafkaProducer};
#[cfg(test)]
pub use memory::InMemoryProducer;
pub use memory::LoggingProducer;
pub use message::{InboundMessage, OutboundMessage, ACTION_HEADER};
pub use publisher::{MessageProducer, TopicPublisher};
