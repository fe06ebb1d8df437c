//! Common test fixtures
//!
//! Builds a complete engine wired to the mock backend, the in-memory store,
//! and the recording metrics sink, with timings tuned for fast tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use persona_engine::backend::{InMemoryStore, MockModelBackend, MockSettings};
use persona_engine::config::EngineConfig;
use persona_engine::metrics::RecordingMetrics;
use persona_engine::persona::PersonaCatalog;
use persona_engine::types::Message;
use persona_engine::Orchestrator;

/// Everything a behavior test needs to drive and observe the engine.
pub struct TestEngine {
    pub orchestrator: Orchestrator,
    pub backend: Arc<MockModelBackend>,
    pub store: Arc<InMemoryStore>,
    pub metrics: Arc<RecordingMetrics>,
}

/// Fast-timing configuration: small backoffs so retry tests run in
/// milliseconds, a breaker threshold high enough to stay out of the way
/// unless a test lowers it.
pub fn test_config(workers: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.orchestrator.workers = workers;
    config.orchestrator.max_pending = 64;
    config.orchestrator.default_deadline_ms = 2000;
    config.retry.max_attempts = 3;
    config.retry.initial_backoff_ms = 5;
    config.retry.max_backoff_ms = 20;
    config.retry.max_elapsed_ms = 10_000;
    config.breaker.failure_threshold = 50;
    config.breaker.cooldown_ms = 10_000;
    config
}

/// Build an engine with the given config and mock latency. Call
/// `orchestrator.start()` yourself when the test needs running workers.
pub fn build_engine(config: &EngineConfig, latency: Duration) -> TestEngine {
    let catalog =
        Arc::new(PersonaCatalog::load_bundled(config.default_persona()).expect("bundled catalog"));
    let backend = Arc::new(MockModelBackend::with_settings(MockSettings {
        latency,
        ..Default::default()
    }));
    let store = Arc::new(InMemoryStore::new(config.orchestrator.context_window));
    let metrics = Arc::new(RecordingMetrics::new());

    let orchestrator = Orchestrator::new(
        config,
        catalog,
        backend.clone(),
        store.clone(),
        metrics.clone(),
    );

    TestEngine {
        orchestrator,
        backend,
        store,
        metrics,
    }
}

/// Engine with default test config and the given worker count, started.
pub fn started_engine(workers: usize, latency: Duration) -> TestEngine {
    let engine = build_engine(&test_config(workers), latency);
    engine.orchestrator.start();
    engine
}

/// Shorthand for a plain message.
pub fn msg(conversation: &str, content: &str) -> Message {
    Message::new(conversation, "tester", content)
}
