// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the choreography
// ============================================================================
//
// Covers the moving parts of cross-service convergence:
// - Events announced per topic/action, and announcements that failed
// - Consumed messages per topic/action/outcome
// - Owner cache lookups and explicit invalidations
// - Messages parked in the dead letter store
//
// All metrics are registered with one Registry scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Publishing
    pub events_published: IntCounterVec,
    pub publish_failures: IntCounterVec,

    // Consuming
    pub messages_consumed: IntCounterVec,

    // Owner-resolution cache
    pub cache_lookups: IntCounterVec,
    pub cache_invalidations: IntCounter,

    // Dead letters
    pub dead_letters: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Domain events handed to the broker"),
            &["topic", "action"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("publish_failures_total", "Committed changes that could not be announced"),
            &["topic"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let messages_consumed = IntCounterVec::new(
            Opts::new("messages_consumed_total", "Consumed messages by outcome"),
            &["topic", "action", "outcome"],
        )?;
        registry.register(Box::new(messages_consumed.clone()))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("owner_cache_lookups_total", "Owner cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_invalidations = IntCounter::new(
            "owner_cache_invalidations_total",
            "Owner projections removed after a remote delete",
        )?;
        registry.register(Box::new(cache_invalidations.clone()))?;

        let dead_letters = IntCounterVec::new(
            Opts::new("dead_letters_total", "Messages parked for manual replay"),
            &["topic", "source"],
        )?;
        registry.register(Box::new(dead_letters.clone()))?;

        Ok(Self {
            registry,
            events_published,
            publish_failures,
            messages_consumed,
            cache_lookups,
            cache_invalidations,
            dead_letters,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_published(&self, topic: &str, action: &str) {
        self.events_published.with_label_values(&[topic, action]).inc();
    }

    pub fn record_publish_failure(&self, topic: &str) {
        self.publish_failures.with_label_values(&[topic]).inc();
    }

    pub fn record_consumed(&self, topic: &str, action: &str, outcome: &str) {
        self.messages_consumed.with_label_values(&[topic, action, outcome]).inc();
    }

    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn record_cache_invalidation(&self) {
        self.cache_invalidations.inc();
    }

    pub fn record_dead_letter(&self, topic: &str, source: &str) {
        self.dead_letters.with_label_values(&[topic, source]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> f64 {
        metrics
            .registry()
            .gather()
            .iter()
            .find(|family| family.name() == name)
            .map(|family| family.metric.iter().map(|m| m.counter.value.unwrap_or_default()).sum())
            .unwrap_or_default()
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cache_invalidation();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_published() {
        let metrics = Metrics::new().unwrap();
        metrics.record_published("identity", "CREATE");
        metrics.record_published("identity", "DELETE");
        metrics.record_published("identity", "DELETE");

        assert_eq!(counter_value(&metrics, "events_published_total"), 3.0);
    }

    #[test]
    fn test_record_cache_lookups_by_result() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cache_lookup("hit");
        metrics.record_cache_lookup("miss");

        let gathered = metrics.registry().gather();
        let lookups = gathered
            .iter()
            .find(|m| m.name() == "owner_cache_lookups_total")
            .unwrap();
        assert_eq!(lookups.metric.len(), 2);
    }

    #[test]
    fn test_record_dead_letter() {
        let metrics = Metrics::new().unwrap();
        metrics.record_dead_letter("pet", "producer");
        assert_eq!(counter_value(&metrics, "dead_letters_total"), 1.0);
    }
}
