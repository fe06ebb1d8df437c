//! Task lifecycle types.
//!
//! A task is the unit of work flowing through the orchestrator: one message,
//! one selected persona, one bounded execution with retries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::persona::Persona;

use super::context::ConversationContext;
use super::message::Message;

// ─────────────────────────────────────────────────────────────────
// Task Status
// ─────────────────────────────────────────────────────────────────

/// Task state machine.
///
/// `Pending → Running → Succeeded`, or `Running → Failed → Retrying →
/// Running` while attempts remain, then `Failed → DeadLettered`. `Cancelled`
/// is reachable from `Pending` and from `Running` once the in-flight call
/// unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
    Cancelled,
    DeadLettered,
}

impl TaskStatus {
    /// Terminal states are never left and their tasks are eligible for
    /// garbage collection once observed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Cancelled | TaskStatus::DeadLettered
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::DeadLettered => "dead_lettered",
        };
        write!(f, "{}", s)
    }
}

// ─────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────

/// A routed message awaiting or undergoing execution.
///
/// Owned by the orchestrator for its lifetime. The task id doubles as the
/// correlation id on every log line and result tied to this submission.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique id, also the correlation id.
    pub id: Uuid,

    /// Conversation (lane) this task belongs to.
    pub conversation_id: String,

    /// The submitted message.
    pub message: Arc<Message>,

    /// Persona selected at submission time.
    pub persona: Arc<Persona>,

    /// Router match score for the selected persona, in [0, 1].
    pub match_score: f64,

    /// Context snapshot taken at submission time.
    pub context: ConversationContext,

    /// Per-attempt deadline for the backend call.
    pub deadline: Duration,

    /// Dedup key copied from the message, if any.
    pub dedup_key: Option<String>,

    /// When the task was admitted.
    pub submitted_at: DateTime<Utc>,
}

/// One failed attempt, kept for dead-letter reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub error: String,
    pub classification: String,
    pub at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────
// Execution Result
// ─────────────────────────────────────────────────────────────────

/// Final output of a successfully executed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Correlation id (the task id).
    pub task_id: Uuid,

    /// Persona that produced the response.
    pub persona_id: String,

    /// Response text.
    pub text: String,

    /// Blended confidence score, always in [0, 1].
    pub confidence: f64,

    /// Wall time from first attempt start to completion.
    pub latency: Duration,

    /// Number of backend attempts consumed (1 = no retries).
    pub attempts: u32,
}

// ─────────────────────────────────────────────────────────────────
// Task Handle
// ─────────────────────────────────────────────────────────────────

/// Caller-side handle to an admitted task.
///
/// The terminal outcome is delivered exactly once through the handle;
/// intermediate retries never surface here.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: Uuid,
    rx: oneshot::Receiver<Result<ExecutionResult>>,
}

impl TaskHandle {
    pub(crate) fn new(task_id: Uuid, rx: oneshot::Receiver<Result<ExecutionResult>>) -> Self {
        Self { task_id, rx }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> Result<ExecutionResult> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Internal(format!(
                "orchestrator dropped before delivering outcome for task {}",
                self.task_id
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::DeadLettered.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Retrying.is_terminal());
        assert!(!TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::DeadLettered.to_string(), "dead_lettered");
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
    }

    #[tokio::test]
    async fn test_handle_delivers_outcome() {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let handle = TaskHandle::new(id, rx);
        tx.send(Ok(ExecutionResult {
            task_id: id,
            persona_id: "mentor".into(),
            text: "hi".into(),
            confidence: 0.5,
            latency: Duration::from_millis(3),
            attempts: 1,
        }))
        .unwrap();

        let result = handle.wait().await.unwrap();
        assert_eq!(result.task_id, id);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_sender() {
        let (tx, rx) = oneshot::channel::<Result<ExecutionResult>>();
        let handle = TaskHandle::new(Uuid::new_v4(), rx);
        drop(tx);
        assert!(handle.wait().await.is_err());
    }
}
