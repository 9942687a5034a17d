use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Policy
// ============================================================================
//
// Used by adapters, never by orchestrators: a use case composes a single
// attempt and relies on the adapter to absorb transient broker trouble.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy for announcing committed changes: more patient than the
    /// default, since the alternative is parking the message.
    pub fn for_publishing() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) before trying again.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(failed_attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, `should_retry` rejects the error,
    /// or the attempts run out.
    pub async fn run<F, Fut, T, E, R>(&self, mut operation: F, should_retry: R) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt >= self.max_attempts || !should_retry(&error) => {
                    tracing::error!(
                        attempt,
                        error = %error,
                        "Giving up on operation"
                    );
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Operation failed, retrying after delay"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Final error of a retried operation.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}
