//! Retry policy and circuit breaker around the model backend.

mod breaker;
mod policy;

pub use breaker::{BreakerSettings, BreakerState, CircuitBreaker};
pub use policy::{RetryOutcome, RetryPolicy};
