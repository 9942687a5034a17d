pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig, Tripped};
pub use retry::{RetryExhausted, RetryPolicy};
