//! Mock model backend
//!
//! Deterministic stand-in used by the test suite and the CLI chat loop.
//! Supports fixed latency, scripted per-call outcomes, and call counting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};

use super::traits::{InvocationRequest, ModelBackend, ModelOutput};

// ─────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────

/// Mock behavior knobs.
#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Simulated latency per call.
    pub latency: Duration,

    /// Model-reported confidence attached to successful calls.
    pub confidence: Option<f64>,

    /// Fixed response text; default echoes the persona and message.
    pub fixed_response: Option<String>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(10),
            confidence: Some(0.9),
            fixed_response: None,
        }
    }
}

/// One scripted outcome, consumed in FIFO order before falling back to the
/// default success behavior.
#[derive(Debug, Clone)]
pub enum MockStep {
    Succeed,
    FailTransient(&'static str),
    FailPermanent(&'static str),
    /// Sleep long enough to trip any reasonable per-attempt deadline.
    Hang(Duration),
}

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

pub struct MockModelBackend {
    settings: MockSettings,
    script: Mutex<VecDeque<MockStep>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockModelBackend {
    pub fn new() -> Self {
        Self::with_settings(MockSettings::default())
    }

    pub fn with_settings(settings: MockSettings) -> Self {
        Self {
            settings,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue scripted outcomes for the next calls.
    pub fn push_script(&self, steps: impl IntoIterator<Item = MockStep>) {
        self.script.lock().extend(steps);
    }

    /// Total calls observed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrent calls, for isolation assertions.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> MockStep {
        self.script
            .lock()
            .pop_front()
            .unwrap_or(MockStep::Succeed)
    }
}

impl Default for MockModelBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for MockModelBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: InvocationRequest<'_>) -> Result<ModelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let step = self.next_step();
        let result = match step {
            MockStep::Succeed => {
                tokio::time::sleep(self.settings.latency).await;
                let text = self.settings.fixed_response.clone().unwrap_or_else(|| {
                    format!(
                        "[{} turns of context] {}",
                        request.context.len(),
                        request.message.content
                    )
                });
                Ok(ModelOutput {
                    text,
                    confidence: self.settings.confidence,
                })
            }
            MockStep::FailTransient(msg) => {
                tokio::time::sleep(self.settings.latency).await;
                Err(Error::transient(msg))
            }
            MockStep::FailPermanent(msg) => {
                tokio::time::sleep(self.settings.latency).await;
                Err(Error::permanent(msg))
            }
            MockStep::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(ModelOutput {
                    text: "late".into(),
                    confidence: None,
                })
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationContext, Message};

    fn request<'a>(
        message: &'a Message,
        context: &'a ConversationContext,
    ) -> InvocationRequest<'a> {
        InvocationRequest {
            system_prompt: "You mentor.",
            message,
            context,
            deadline: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_default_echo() {
        let backend = MockModelBackend::with_settings(MockSettings {
            latency: Duration::ZERO,
            ..Default::default()
        });
        let msg = Message::new("c1", "u1", "hello");
        let ctx = ConversationContext::empty("c1");
        let out = backend.invoke(request(&msg, &ctx)).await.unwrap();
        assert!(out.text.contains("hello"));
        assert_eq!(out.confidence, Some(0.9));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let backend = MockModelBackend::with_settings(MockSettings {
            latency: Duration::ZERO,
            ..Default::default()
        });
        backend.push_script([
            MockStep::FailTransient("502"),
            MockStep::FailPermanent("bad request"),
        ]);
        let msg = Message::new("c1", "u1", "x");
        let ctx = ConversationContext::empty("c1");

        let err = backend.invoke(request(&msg, &ctx)).await.unwrap_err();
        assert!(err.is_transient());
        let err = backend.invoke(request(&msg, &ctx)).await.unwrap_err();
        assert!(err.is_permanent());
        // Script exhausted: back to success.
        assert!(backend.invoke(request(&msg, &ctx)).await.is_ok());
        assert_eq!(backend.call_count(), 3);
    }
}
