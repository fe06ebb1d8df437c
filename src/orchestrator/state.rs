//! Task table
//!
//! Tracks every admitted task: status transitions, attempt history,
//! cancellation signal, and the one-shot result channel back to the caller.
//! Terminal entries stay queryable until pruned by retention cleanup.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{AttemptRecord, ExecutionResult, Task, TaskStatus};

// ─────────────────────────────────────────────────────────────────
// Entry
// ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct TaskEntry {
    task: Task,
    status: TaskStatus,
    attempts: u32,
    history: Vec<AttemptRecord>,
    cancel_tx: Option<oneshot::Sender<()>>,
    cancel_rx: Option<oneshot::Receiver<()>>,
    result_tx: Option<oneshot::Sender<Result<ExecutionResult>>>,
    completed_at: Option<Instant>,
}

/// What `request_cancel` decided; the orchestrator finishes the job.
#[derive(Debug)]
pub enum CancelAction {
    /// Task was still pending; it is now terminal and must be removed from
    /// its lane queue.
    CancelledPending,
    /// Task was running or between retries; the in-flight call has been
    /// signalled and the worker will finish the transition.
    SignalledRunning,
}

// ─────────────────────────────────────────────────────────────────
// Task Table
// ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, TaskEntry>,
    /// (conversation, dedup key) → live task.
    dedup: HashMap<(String, String), Uuid>,
}

pub struct TaskTable {
    inner: RwLock<Inner>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a freshly admitted task.
    ///
    /// Fails with `DuplicateSubmission` when a non-terminal task already
    /// holds the same (conversation, dedup key) pair.
    pub fn register(
        &self,
        task: Task,
        result_tx: oneshot::Sender<Result<ExecutionResult>>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(key) = task.dedup_key.clone() {
            let slot = (task.conversation_id.clone(), key);
            if let Some(existing) = inner.dedup.get(&slot) {
                return Err(Error::DuplicateSubmission { task_id: *existing });
            }
            inner.dedup.insert(slot, task.id);
        }
        let (cancel_tx, cancel_rx) = oneshot::channel();
        inner.entries.insert(
            task.id,
            TaskEntry {
                task,
                status: TaskStatus::Pending,
                attempts: 0,
                history: Vec::new(),
                cancel_tx: Some(cancel_tx),
                cancel_rx: Some(cancel_rx),
                result_tx: Some(result_tx),
                completed_at: None,
            },
        );
        Ok(())
    }

    /// Current status.
    pub fn status(&self, task_id: Uuid) -> Result<TaskStatus> {
        self.inner
            .read()
            .entries
            .get(&task_id)
            .map(|e| e.status)
            .ok_or(Error::UnknownTask(task_id))
    }

    /// Attempt history so far (failed attempts only).
    pub fn attempt_history(&self, task_id: Uuid) -> Result<Vec<AttemptRecord>> {
        self.inner
            .read()
            .entries
            .get(&task_id)
            .map(|e| e.history.clone())
            .ok_or(Error::UnknownTask(task_id))
    }

    /// Transition a claimed task to Running and hand the worker what it
    /// needs. Returns None if the task was cancelled between claim and
    /// start; the worker must just release the lane.
    pub fn begin(&self, task_id: Uuid) -> Option<(Task, oneshot::Receiver<()>)> {
        let mut inner = self.inner.write();
        let entry = inner.entries.get_mut(&task_id)?;
        if entry.status != TaskStatus::Pending {
            return None;
        }
        entry.status = TaskStatus::Running;
        let cancel_rx = entry.cancel_rx.take()?;
        Some((entry.task.clone(), cancel_rx))
    }

    /// Record one backend attempt starting (1-based).
    pub fn note_attempt(&self, task_id: Uuid, attempt: u32) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get_mut(&task_id) {
            entry.attempts = attempt;
            if attempt > 1 {
                entry.status = TaskStatus::Running;
            }
        }
    }

    /// Record a failed attempt. `will_retry` distinguishes the
    /// `Failed → Retrying` transition from a final failure about to be
    /// dead-lettered.
    pub fn note_failure(&self, task_id: Uuid, attempt: u32, error: &Error, will_retry: bool) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get_mut(&task_id) {
            entry.history.push(AttemptRecord {
                attempt,
                error: error.to_string(),
                classification: error.label().to_string(),
                at: Utc::now(),
            });
            entry.status = if will_retry {
                TaskStatus::Retrying
            } else {
                TaskStatus::Failed
            };
        }
    }

    /// Terminal: succeeded. Delivers the result through the handle.
    pub fn complete_success(&self, task_id: Uuid, result: ExecutionResult) {
        self.finish(task_id, TaskStatus::Succeeded, Ok(result));
    }

    /// Terminal: dead-lettered. Attempt history was already recorded per
    /// failure by `note_failure`.
    pub fn complete_failure(&self, task_id: Uuid, error: Error) {
        self.finish(task_id, TaskStatus::DeadLettered, Err(error));
    }

    /// Terminal: cancelled while running, after the in-flight call unwound.
    pub fn complete_cancelled(&self, task_id: Uuid) {
        self.finish(
            task_id,
            TaskStatus::Cancelled,
            Err(Error::Cancelled { task_id }),
        );
    }

    fn finish(&self, task_id: Uuid, status: TaskStatus, outcome: Result<ExecutionResult>) {
        let mut inner = self.inner.write();
        let Some(entry) = inner.entries.get_mut(&task_id) else {
            return;
        };
        if entry.status.is_terminal() {
            return;
        }
        entry.status = status;
        entry.completed_at = Some(Instant::now());
        let tx = entry.result_tx.take();
        if let Some(key) = entry.task.dedup_key.clone() {
            let slot = (entry.task.conversation_id.clone(), key);
            inner.dedup.remove(&slot);
        }
        drop(inner);
        if let Some(tx) = tx {
            // The caller may have dropped its handle; that is fine.
            let _ = tx.send(outcome);
        }
    }

    /// Cancel a task. Pending tasks become terminal immediately; running
    /// ones are signalled and the worker completes the transition.
    pub fn request_cancel(&self, task_id: Uuid) -> Result<CancelAction> {
        let mut inner = self.inner.write();
        let entry = inner
            .entries
            .get_mut(&task_id)
            .ok_or(Error::UnknownTask(task_id))?;
        match entry.status {
            TaskStatus::Pending => {
                entry.status = TaskStatus::Cancelled;
                entry.completed_at = Some(Instant::now());
                let tx = entry.result_tx.take();
                if let Some(key) = entry.task.dedup_key.clone() {
                    let slot = (entry.task.conversation_id.clone(), key);
                    inner.dedup.remove(&slot);
                }
                drop(inner);
                if let Some(tx) = tx {
                    let _ = tx.send(Err(Error::Cancelled { task_id }));
                }
                Ok(CancelAction::CancelledPending)
            }
            TaskStatus::Running | TaskStatus::Retrying | TaskStatus::Failed => {
                if let Some(tx) = entry.cancel_tx.take() {
                    let _ = tx.send(());
                }
                Ok(CancelAction::SignalledRunning)
            }
            status => Err(Error::AlreadyTerminal {
                task_id,
                status: status.to_string(),
            }),
        }
    }

    /// Conversation id for a task (for lane bookkeeping on cancel).
    pub fn conversation_of(&self, task_id: Uuid) -> Option<String> {
        self.inner
            .read()
            .entries
            .get(&task_id)
            .map(|e| e.task.conversation_id.clone())
    }

    /// Number of tracked tasks, terminal included.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the oldest terminal entries beyond `keep`.
    pub fn cleanup_terminal(&self, keep: usize) {
        let mut inner = self.inner.write();
        let mut terminal: Vec<(Uuid, Instant)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.status.is_terminal())
            .filter_map(|(id, e)| e.completed_at.map(|at| (*id, at)))
            .collect();
        if terminal.len() <= keep {
            return;
        }
        terminal.sort_by_key(|(_, at)| *at);
        let excess = terminal.len() - keep;
        for (id, _) in terminal.into_iter().take(excess) {
            inner.entries.remove(&id);
        }
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
