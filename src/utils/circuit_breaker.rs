use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Stops hammering a dependency that keeps failing.
//
// Closed   --(failure_threshold consecutive failures)--> Open
// Open     --(open_for elapsed, next call admitted)-----> HalfOpen
// HalfOpen --(probe_successes successes)----------------> Closed
// HalfOpen --(any failure)------------------------------> Open
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_for: Duration,
    pub probe_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
            probe_successes: 3,
        }
    }
}

#[derive(Debug)]
struct Counters {
    state: BreakerState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    counters: Arc<Mutex<Counters>>,
}

/// Why a guarded call did not produce a value.
#[derive(Debug, PartialEq, Eq)]
pub enum Tripped<E> {
    /// The call was rejected without running.
    Open,
    /// The call ran and failed.
    Failed(E),
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name),
            config,
            counters: Arc::new(Mutex::new(Counters {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `operation` if the breaker admits it and record the outcome.
    pub async fn guard<F, T, E>(&self, operation: F) -> Result<T, Tripped<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.admit().await {
            return Err(Tripped::Open);
        }

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(error) => {
                self.on_failure().await;
                Err(Tripped::Failed(error))
            }
        }
    }

    async fn admit(&self) -> bool {
        let mut counters = self.counters.lock().await;

        match counters.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let cooled_down = counters
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= self.config.open_for);
                if cooled_down {
                    tracing::info!(breaker = %self.name, "Circuit breaker half-open, probing");
                    counters.state = BreakerState::HalfOpen;
                    counters.probe_successes = 0;
                }
                cooled_down
            }
        }
    }

    async fn on_success(&self) {
        let mut counters = self.counters.lock().await;
        counters.consecutive_failures = 0;

        if counters.state == BreakerState::HalfOpen {
            counters.probe_successes += 1;
            if counters.probe_successes >= self.config.probe_successes {
                tracing::info!(breaker = %self.name, "Circuit breaker closed");
                counters.state = BreakerState::Closed;
                counters.probe_successes = 0;
                counters.opened_at = None;
            }
        }
    }

    async fn on_failure(&self) {
        let mut counters = self.counters.lock().await;
        counters.consecutive_failures += 1;

        let trip = match counters.state {
            BreakerState::Closed => counters.consecutive_failures >= self.config.failure_threshold,
            BreakerState::HalfOpen => true,
            BreakerState::Open => false,
        };

        if trip {
            tracing::warn!(
                breaker = %self.name,
                failures = counters.consecutive_failures,
                "Circuit breaker opened"
            );
            counters.state = BreakerState::Open;
            counters.opened_at = Some(Instant::now());
            counters.probe_successes = 0;
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.counters.lock().await.state
    }

    pub async fn reset(&self) {
        let mut counters = self.counters.lock().await;
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset");
        counters.state = BreakerState::Closed;
        counters.consecutive_failures = 0;
        counters.probe_successes = 0;
        counters.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, open_for: Duration, probes: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                open_for,
                probe_successes: probes,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60), 1);

        for _ in 0..3 {
            let result = cb.guard(async { Err::<(), _>("down") }).await;
            assert_eq!(result, Err(Tripped::Failed("down")));
        }
        assert_eq!(cb.state().await, BreakerState::Open);

        let rejected = cb.guard(async { Ok::<_, &str>(()) }).await;
        assert_eq!(rejected, Err(Tripped::Open));
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = breaker(2, Duration::from_secs(60), 1);

        let _ = cb.guard(async { Err::<(), _>("down") }).await;
        let _ = cb.guard(async { Ok::<_, &str>(()) }).await;
        let _ = cb.guard(async { Err::<(), _>("down") }).await;

        assert_eq!(cb.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_circuit() {
        let cb = breaker(1, Duration::from_millis(20), 1);

        let _ = cb.guard(async { Err::<(), _>("down") }).await;
        assert_eq!(cb.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cb.guard(async { Ok::<_, &str>(()) }).await.is_ok());
        assert_eq!(cb.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(20), 2);

        let _ = cb.guard(async { Err::<(), _>("down") }).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let _ = cb.guard(async { Err::<(), _>("still down") }).await;

        assert_eq!(cb.state().await, BreakerState::Open);
    }
}
