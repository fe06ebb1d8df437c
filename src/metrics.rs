//! Metrics sink port.
//!
//! Best-effort and non-blocking by contract: implementations must never
//! stall a worker. The engine reports routing decisions, retries, circuit
//! state changes, lane depth, and terminal task outcomes.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// Counter and timer sink consumed by the orchestrator.
pub trait MetricsSink: Send + Sync {
    fn counter(&self, name: &'static str, value: u64);

    fn gauge(&self, name: &'static str, value: f64);

    fn timer(&self, name: &'static str, elapsed: Duration);
}

// ─────────────────────────────────────────────────────────────────
// Metric names
// ─────────────────────────────────────────────────────────────────

/// Metric name constants, kept in one place so dashboards and tests agree.
pub mod names {
    pub const ROUTE_DECISIONS: &str = "router.decisions";
    pub const ROUTE_FALLBACKS: &str = "router.fallbacks";
    pub const TASKS_SUBMITTED: &str = "tasks.submitted";
    pub const TASKS_REJECTED_FULL: &str = "tasks.rejected.queue_full";
    pub const TASKS_REJECTED_INVALID: &str = "tasks.rejected.validation";
    pub const TASKS_SUCCEEDED: &str = "tasks.succeeded";
    pub const TASKS_DEAD_LETTERED: &str = "tasks.dead_lettered";
    pub const TASKS_CANCELLED: &str = "tasks.cancelled";
    pub const TASK_LATENCY: &str = "tasks.latency";
    pub const RETRY_ATTEMPTS: &str = "retry.attempts";
    pub const BREAKER_OPENED: &str = "breaker.opened";
    pub const BREAKER_CLOSED: &str = "breaker.closed";
    pub const LANE_DEPTH: &str = "lanes.depth";
    pub const STORE_APPEND_FAILED: &str = "store.append_failed";
}

// ─────────────────────────────────────────────────────────────────
// Implementations
// ─────────────────────────────────────────────────────────────────

/// Discards everything.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn counter(&self, _name: &'static str, _value: u64) {}
    fn gauge(&self, _name: &'static str, _value: f64) {}
    fn timer(&self, _name: &'static str, _elapsed: Duration) {}
}

/// Records everything in memory; test double.
#[derive(Default)]
pub struct RecordingMetrics {
    counters: Mutex<HashMap<&'static str, u64>>,
    gauges: Mutex<HashMap<&'static str, f64>>,
    timers: Mutex<HashMap<&'static str, Vec<Duration>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_value(&self, name: &'static str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn gauge_value(&self, name: &'static str) -> Option<f64> {
        self.gauges.lock().get(name).copied()
    }

    pub fn timer_samples(&self, name: &'static str) -> usize {
        self.timers.lock().get(name).map(|v| v.len()).unwrap_or(0)
    }
}

impl MetricsSink for RecordingMetrics {
    fn counter(&self, name: &'static str, value: u64) {
        *self.counters.lock().entry(name).or_insert(0) += value;
    }

    fn gauge(&self, name: &'static str, value: f64) {
        self.gauges.lock().insert(name, value);
    }

    fn timer(&self, name: &'static str, elapsed: Duration) {
        self.timers.lock().entry(name).or_default().push(elapsed);
    }
}
