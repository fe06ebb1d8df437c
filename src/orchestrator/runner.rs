//! Workflow orchestrator
//!
//! Owns the worker pool and drives every task through its lifecycle:
//! validation, routing, admission, lane FIFO scheduling, retried backend
//! execution, and result delivery. At most one task per conversation runs
//! at a time; unrelated conversations proceed in parallel up to the worker
//! count.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::ResponseAssembler;
use crate::backend::{ConversationStore, InvocationRequest, ModelBackend, ModelOutput};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::metrics::{names, MetricsSink};
use crate::persona::{PersonaCatalog, PersonaRouter};
use crate::retry::{CircuitBreaker, RetryOutcome, RetryPolicy};
use crate::types::{AttemptRecord, Message, Task, TaskHandle, TaskStatus};

use super::lane::LaneMap;
use super::ratelimit::RateLimiter;
use super::state::{CancelAction, TaskTable};

// ─────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────

struct Inner {
    max_pending: usize,
    max_message_len: usize,
    context_window: usize,
    task_retention: usize,
    deadline: std::time::Duration,

    catalog: Arc<PersonaCatalog>,
    router: PersonaRouter,
    assembler: ResponseAssembler,
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn ConversationStore>,
    metrics: Arc<dyn MetricsSink>,

    retry: RetryPolicy,
    breaker: CircuitBreaker,
    limiter: RateLimiter,

    lanes: Mutex<LaneMap>,
    table: TaskTable,

    /// Wakes one idle worker. Submission and lane release both signal it;
    /// workers always re-check the lanes before parking, so the stored
    /// permit covers the submit-while-parking race.
    work_ready: Notify,
}

// ─────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────

pub struct Orchestrator {
    inner: Arc<Inner>,
    worker_count: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        catalog: Arc<PersonaCatalog>,
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ConversationStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let inner = Arc::new(Inner {
            max_pending: config.orchestrator.max_pending,
            max_message_len: config.orchestrator.max_message_len,
            context_window: config.orchestrator.context_window,
            task_retention: config.orchestrator.task_retention,
            deadline: config.deadline(),
            catalog,
            router: PersonaRouter::new(config.router.clone()),
            assembler: ResponseAssembler::new(config.confidence.clone()),
            backend,
            store,
            metrics,
            retry: config.retry_policy(),
            breaker: CircuitBreaker::new(config.breaker_settings()),
            limiter: RateLimiter::new(
                config.orchestrator.rate_limit_per_sec,
                config.orchestrator.rate_burst,
            ),
            lanes: Mutex::new(LaneMap::new()),
            table: TaskTable::new(),
            work_ready: Notify::new(),
        });
        Self {
            inner,
            worker_count: config.worker_count(),
            workers: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Spawn the worker pool. Idempotent only in the sense that calling it
    /// twice spawns a second pool, so don't.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        for worker_id in 0..self.worker_count {
            let inner = self.inner.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            workers.push(tokio::spawn(worker_loop(inner, worker_id, shutdown_rx)));
        }
        info!(workers = self.worker_count, "orchestrator started");
    }

    /// Stop accepting work and wait for workers to finish their current
    /// tasks. Queued tasks stay in the table as pending.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.inner.work_ready.notify_waiters();
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.await;
        }
        info!("orchestrator stopped");
    }

    /// Submit a message for execution.
    ///
    /// Synchronous rejections (validation, duplicate dedup key, full queue)
    /// come back as `Err` here; everything after admission is delivered
    /// through the returned handle.
    pub async fn submit(&self, message: Message) -> Result<TaskHandle> {
        let inner = &self.inner;

        if let Err(err) = validate(&message, inner.max_message_len) {
            inner.metrics.counter(names::TASKS_REJECTED_INVALID, 1);
            return Err(err);
        }

        // Route against one immutable snapshot; a concurrent catalog reload
        // cannot shift the decision mid-flight.
        let snapshot = inner.catalog.snapshot();
        let decision = inner.router.route(&message, &snapshot);
        inner.metrics.counter(names::ROUTE_DECISIONS, 1);
        if decision.fallback {
            inner.metrics.counter(names::ROUTE_FALLBACKS, 1);
        }
        debug!(
            conversation = %message.conversation_id,
            persona = decision.persona.id(),
            score = decision.score,
            fallback = decision.fallback,
            "message routed"
        );

        let mut context = inner.store.load_context(&message.conversation_id).await?;
        if context.turns.len() > inner.context_window {
            let skip = context.turns.len() - inner.context_window;
            context.turns.drain(..skip);
        }

        let task = Task {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id.clone(),
            dedup_key: message.dedup_key.clone(),
            message: Arc::new(message),
            persona: decision.persona,
            match_score: decision.score,
            context,
            deadline: inner.deadline,
            submitted_at: chrono::Utc::now(),
        };
        let task_id = task.id;
        let conversation_id = task.conversation_id.clone();
        let (result_tx, result_rx) = oneshot::channel();

        // Admission and registration under the lane lock so the pending
        // count cannot drift between the check and the push.
        {
            let mut lanes = self.inner.lanes.lock();
            if lanes.pending() >= inner.max_pending {
                inner.metrics.counter(names::TASKS_REJECTED_FULL, 1);
                return Err(Error::QueueFull {
                    pending: lanes.pending(),
                    limit: inner.max_pending,
                });
            }
            inner.table.register(task, result_tx)?;
            lanes.push(&conversation_id, task_id);
            inner.metrics.gauge(names::LANE_DEPTH, lanes.pending() as f64);
        }
        inner.metrics.counter(names::TASKS_SUBMITTED, 1);
        inner.work_ready.notify_one();

        debug!(task = %task_id, conversation = %conversation_id, "task admitted");
        Ok(TaskHandle::new(task_id, result_rx))
    }

    /// Current status of a submitted task.
    pub fn status(&self, task_id: Uuid) -> Result<TaskStatus> {
        self.inner.table.status(task_id)
    }

    /// Failed-attempt history for a task.
    pub fn attempt_history(&self, task_id: Uuid) -> Result<Vec<AttemptRecord>> {
        self.inner.table.attempt_history(task_id)
    }

    /// Cancel a task. Pending tasks terminate immediately; running tasks
    /// are signalled and terminate once the in-flight call unwinds.
    pub fn cancel(&self, task_id: Uuid) -> Result<()> {
        let inner = &self.inner;
        match inner.table.request_cancel(task_id)? {
            CancelAction::CancelledPending => {
                if let Some(conversation_id) = inner.table.conversation_of(task_id) {
                    inner.lanes.lock().remove_queued(&conversation_id, task_id);
                }
                inner.metrics.counter(names::TASKS_CANCELLED, 1);
                info!(task = %task_id, "pending task cancelled");
            }
            CancelAction::SignalledRunning => {
                info!(task = %task_id, "running task signalled for cancellation");
            }
        }
        Ok(())
    }

    /// Tasks queued across all lanes (excludes running ones).
    pub fn pending(&self) -> usize {
        self.inner.lanes.lock().pending()
    }
}

// ─────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────

fn validate(message: &Message, max_len: usize) -> Result<()> {
    if message.conversation_id.trim().is_empty() {
        return Err(Error::invalid_field(
            "conversation_id",
            "conversation id must not be empty",
        ));
    }
    if message.sender_id.trim().is_empty() {
        return Err(Error::invalid_field(
            "sender_id",
            "sender id must not be empty",
        ));
    }
    if message.content.trim().is_empty() {
        return Err(Error::invalid_field(
            "content",
            "message content must not be empty",
        ));
    }
    if message.content.chars().count() > max_len {
        return Err(Error::invalid_field(
            "content",
            format!(
                "message content exceeds {} characters",
                max_len
            ),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Worker Loop
// ─────────────────────────────────────────────────────────────────

async fn worker_loop(inner: Arc<Inner>, worker_id: usize, mut shutdown_rx: watch::Receiver<bool>) {
    debug!(worker = worker_id, "worker started");
    loop {
        // Drain whatever is claimable before parking.
        loop {
            if *shutdown_rx.borrow() {
                debug!(worker = worker_id, "worker stopping");
                return;
            }
            let claimed = {
                let mut lanes = inner.lanes.lock();
                let claimed = lanes.claim_next();
                // More eligible work may remain; wake another worker.
                if claimed.is_some() && lanes.pending() > 0 {
                    inner.work_ready.notify_one();
                }
                claimed
            };
            match claimed {
                Some((conversation_id, task_id)) => {
                    run_task(&inner, &conversation_id, task_id).await;
                }
                None => break,
            }
        }

        tokio::select! {
            _ = inner.work_ready.notified() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    debug!(worker = worker_id, "worker stopping");
                    return;
                }
            }
        }
    }
}

async fn run_task(inner: &Arc<Inner>, conversation_id: &str, task_id: Uuid) {
    // A cancel may have landed between claim and begin; nothing to run then.
    if let Some((task, cancel_rx)) = inner.table.begin(task_id) {
        execute(inner, task, cancel_rx).await;
        inner.table.cleanup_terminal(inner.task_retention);
    }

    let more = inner.lanes.lock().release(conversation_id);
    if more {
        inner.work_ready.notify_one();
    }
}

async fn execute(inner: &Arc<Inner>, task: Task, mut cancel_rx: oneshot::Receiver<()>) {
    let started = Instant::now();
    let target = inner.backend.name().to_string();

    let outcome = tokio::select! {
        _ = &mut cancel_rx => None,
        outcome = attempt_loop(inner, &task, &target) => Some(outcome),
    };

    match outcome {
        None => {
            // The in-flight backend future was dropped by the select.
            warn!(task = %task.id, conversation = %task.conversation_id, "task cancelled mid-flight");
            inner.metrics.counter(names::TASKS_CANCELLED, 1);
            inner.table.complete_cancelled(task.id);
        }
        Some(RetryOutcome {
            result: Ok(output),
            attempts,
        }) => {
            let latency = started.elapsed();
            let result = inner.assembler.assemble(&task, output, attempts, latency);

            // History persistence is best-effort: the caller still gets the
            // result, the miss is logged and counted.
            if let Err(err) = inner
                .store
                .append_turn(&task.conversation_id, &task.message, &result)
                .await
            {
                warn!(
                    task = %task.id,
                    conversation = %task.conversation_id,
                    error = %err,
                    "failed to persist conversation turn"
                );
                inner.metrics.counter(names::STORE_APPEND_FAILED, 1);
            }

            info!(
                task = %task.id,
                conversation = %task.conversation_id,
                sender = %task.message.sender_id,
                persona = %result.persona_id,
                confidence = result.confidence,
                attempts,
                latency_ms = latency.as_millis() as u64,
                "task succeeded"
            );
            inner.metrics.counter(names::TASKS_SUCCEEDED, 1);
            inner.metrics.timer(names::TASK_LATENCY, latency);
            inner.table.complete_success(task.id, result);
        }
        Some(RetryOutcome {
            result: Err(err),
            attempts,
        }) => {
            let terminal = if err.is_transient() {
                Error::DeadLetter {
                    task_id: task.id,
                    attempts,
                    last_error: err.to_string(),
                }
            } else {
                err
            };
            warn!(
                task = %task.id,
                conversation = %task.conversation_id,
                attempts,
                error = %terminal,
                "task dead-lettered"
            );
            inner.metrics.counter(names::TASKS_DEAD_LETTERED, 1);
            inner.table.complete_failure(task.id, terminal);
        }
    }
}

async fn attempt_loop(
    inner: &Arc<Inner>,
    task: &Task,
    target: &str,
) -> RetryOutcome<ModelOutput> {
    inner
        .retry
        .run(
            &inner.breaker,
            target,
            inner.metrics.as_ref(),
            |attempt| {
                async move {
                    // A task parked on the token bucket is not Running yet.
                    inner.limiter.acquire().await;
                    inner.table.note_attempt(task.id, attempt);

                    let request = InvocationRequest {
                        system_prompt: &task.persona.system_prompt,
                        message: &task.message,
                        context: &task.context,
                        deadline: task.deadline,
                    };
                    match tokio::time::timeout(task.deadline, inner.backend.invoke(request))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout {
                            deadline: task.deadline,
                        }),
                    }
                }
            },
            |attempt, err, will_retry| {
                // Breaker fast-fails land here too; every failed attempt
                // leaves a record.
                inner.table.note_failure(task.id, attempt, err, will_retry);
                debug!(
                    task = %task.id,
                    attempt,
                    classification = err.label(),
                    will_retry,
                    "attempt failed"
                );
            },
        )
        .await
}
