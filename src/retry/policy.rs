//! Retry policy
//!
//! Bounded retry loop with a jittered exponential-backoff schedule. Only
//! transient errors consume retry budget; permanent errors propagate on the
//! first occurrence. The circuit breaker is consulted before every attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::debug;

use crate::error::{Error, Result};
use crate::metrics::{names, MetricsSink};

use super::breaker::{CircuitBreaker, Transition};

// ─────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per task, first try included.
    pub max_attempts: u32,

    /// First backoff delay.
    pub initial_backoff: Duration,

    /// Ceiling for individual delays.
    pub max_backoff: Duration,

    /// Delay growth factor.
    pub multiplier: f64,

    /// Total elapsed budget for one task, attempts and delays included.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            max_elapsed: Duration::from_secs(120),
        }
    }
}

/// Final result of a retried operation plus the attempts consumed.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: self.multiplier,
            max_elapsed_time: Some(self.max_elapsed),
            ..ExponentialBackoff::default()
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the budget runs
    /// out. `op` receives the 1-based attempt number.
    ///
    /// `on_failure` is invoked for every failed attempt with the retry
    /// decision for that attempt. Breaker fast-fails are reported too,
    /// since those never reach `op`.
    pub async fn run<T, F, Fut, H>(
        &self,
        breaker: &CircuitBreaker,
        target: &str,
        metrics: &dyn MetricsSink,
        mut op: F,
        mut on_failure: H,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        H: FnMut(u32, &Error, bool),
    {
        let mut schedule = self.schedule();
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let attempt_result = match breaker.try_acquire(target) {
                Ok(()) => {
                    let result = op(attempts).await;
                    let transition = match &result {
                        Ok(_) => breaker.record_success(target),
                        Err(e) if e.is_transient() => breaker.record_failure(target),
                        Err(_) => Transition::None,
                    };
                    match transition {
                        Transition::Opened => metrics.counter(names::BREAKER_OPENED, 1),
                        Transition::Closed => metrics.counter(names::BREAKER_CLOSED, 1),
                        Transition::None => {}
                    }
                    result
                }
                Err(open) => Err(open),
            };

            let err = match attempt_result {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    }
                }
                Err(err) => err,
            };

            let budget_left =
                attempts < self.max_attempts && started.elapsed() < self.max_elapsed;
            let delay = if err.is_transient() && budget_left {
                schedule.next_backoff()
            } else {
                None
            };
            on_failure(attempts, &err, delay.is_some());

            let Some(delay) = delay else {
                return RetryOutcome {
                    result: Err(err),
                    attempts,
                };
            };
            debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, backing off"
            );
            metrics.counter(names::RETRY_ATTEMPTS, 1);
            tokio::time::sleep(delay).await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
