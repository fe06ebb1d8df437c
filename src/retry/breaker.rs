//! Circuit breaker for backend targets.
//!
//! Tracks consecutive transient failures per target. At the threshold the
//! circuit opens and calls fail fast for a cooldown window; after the
//! cooldown a single half-open probe decides between closing and reopening.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Settings & State
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive transient failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before allowing a probe.
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Observable state of one target's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum TargetState {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

/// Result of recording an outcome, surfaced so the caller can emit metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    None,
    Opened,
    Closed,
}

// ─────────────────────────────────────────────────────────────────
// Circuit Breaker
// ─────────────────────────────────────────────────────────────────

pub struct CircuitBreaker {
    settings: BreakerSettings,
    targets: Mutex<HashMap<String, TargetState>>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a call to `target` may proceed.
    ///
    /// While open and inside the cooldown this fails fast with
    /// `CircuitOpen`. The first check after the cooldown flips to half-open
    /// and is allowed through as the single probe; concurrent callers keep
    /// failing fast until the probe resolves.
    pub fn try_acquire(&self, target: &str) -> Result<()> {
        let mut targets = self.targets.lock();
        let state = targets
            .entry(target.to_string())
            .or_insert(TargetState::Closed { failures: 0 });
        match state {
            TargetState::Closed { .. } => Ok(()),
            TargetState::Open { since } => {
                let elapsed = since.elapsed();
                if elapsed >= self.settings.cooldown {
                    *state = TargetState::HalfOpen;
                    Ok(())
                } else {
                    Err(Error::CircuitOpen {
                        target: target.to_string(),
                        retry_after: self.settings.cooldown - elapsed,
                    })
                }
            }
            TargetState::HalfOpen => Err(Error::CircuitOpen {
                target: target.to_string(),
                retry_after: self.settings.cooldown,
            }),
        }
    }

    /// Record a successful call.
    pub(crate) fn record_success(&self, target: &str) -> Transition {
        let mut targets = self.targets.lock();
        let state = targets
            .entry(target.to_string())
            .or_insert(TargetState::Closed { failures: 0 });
        let was_degraded = !matches!(state, TargetState::Closed { .. });
        *state = TargetState::Closed { failures: 0 };
        if was_degraded {
            Transition::Closed
        } else {
            Transition::None
        }
    }

    /// Record a transient failure. Permanent failures do not touch the
    /// breaker.
    pub(crate) fn record_failure(&self, target: &str) -> Transition {
        let mut targets = self.targets.lock();
        let state = targets
            .entry(target.to_string())
            .or_insert(TargetState::Closed { failures: 0 });
        match state {
            TargetState::Closed { failures } => {
                *failures += 1;
                if *failures >= self.settings.failure_threshold {
                    warn!(target, failures, "circuit opened");
                    *state = TargetState::Open {
                        since: Instant::now(),
                    };
                    Transition::Opened
                } else {
                    Transition::None
                }
            }
            // Failed probe: reopen with a fresh cooldown.
            TargetState::HalfOpen => {
                warn!(target, "probe failed, circuit reopened");
                *state = TargetState::Open {
                    since: Instant::now(),
                };
                Transition::Opened
            }
            TargetState::Open { .. } => Transition::None,
        }
    }

    /// Current state for a target, for metrics and tests.
    pub fn state(&self, target: &str) -> BreakerState {
        match self.targets.lock().get(target) {
            None | Some(TargetState::Closed { .. }) => BreakerState::Closed,
            Some(TargetState::Open { .. }) => BreakerState::Open,
            Some(TargetState::HalfOpen) => BreakerState::HalfOpen,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerSettings {
            failure_threshold: threshold,
            cooldown,
        })
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3, Duration::from_secs(60));
        assert_eq!(cb.record_failure("m"), Transition::None);
        assert_eq!(cb.record_failure("m"), Transition::None);
        assert_eq!(cb.record_failure("m"), Transition::Opened);
        assert_eq!(cb.state("m"), BreakerState::Open);
        assert!(cb.try_acquire("m").is_err());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.record_failure("m");
        cb.record_failure("m");
        cb.record_success("m");
        cb.record_failure("m");
        cb.record_failure("m");
        assert_eq!(cb.state("m"), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_single_probe() {
        let cb = breaker(1, Duration::from_millis(10));
        cb.record_failure("m");
        assert_eq!(cb.state("m"), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(15));
        // First caller becomes the probe...
        assert!(cb.try_acquire("m").is_ok());
        assert_eq!(cb.state("m"), BreakerState::HalfOpen);
        // ...everyone else keeps failing fast.
        assert!(cb.try_acquire("m").is_err());
    }

    #[test]
    fn test_probe_success_closes() {
        let cb = breaker(1, Duration::from_millis(5));
        cb.record_failure("m");
        std::thread::sleep(Duration::from_millis(10));
        cb.try_acquire("m").unwrap();
        assert_eq!(cb.record_success("m"), Transition::Closed);
        assert_eq!(cb.state("m"), BreakerState::Closed);
        assert!(cb.try_acquire("m").is_ok());
    }

    #[test]
    fn test_probe_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(5));
        cb.record_failure("m");
        std::thread::sleep(Duration::from_millis(10));
        cb.try_acquire("m").unwrap();
        assert_eq!(cb.record_failure("m"), Transition::Opened);
        assert_eq!(cb.state("m"), BreakerState::Open);
        // Fresh cooldown applies.
        assert!(cb.try_acquire("m").is_err());
    }

    #[test]
    fn test_targets_isolated() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure("a");
        assert_eq!(cb.state("a"), BreakerState::Open);
        assert_eq!(cb.state("b"), BreakerState::Closed);
        assert!(cb.try_acquire("b").is_ok());
    }

    #[test]
    fn test_retry_after_reported() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure("m");
        match cb.try_acquire("m") {
            Err(Error::CircuitOpen { retry_after, .. }) => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(50));
            }
            other => panic!("expected CircuitOpen, got {:?}", other.err()),
        }
    }
}
