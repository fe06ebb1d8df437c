//! Error types for the persona engine
//!
//! Provides structured error handling with:
//! - A transient/permanent classification used by the retry policy
//! - Synchronous rejection errors for `submit` (validation, admission)
//! - Terminal outcome errors surfaced through task handles

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by the retry policy and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before entering any lane.
    Validation,
    /// Retryable backend failure (timeouts, resets, 5xx-equivalents).
    Transient,
    /// Non-retryable backend failure; propagates immediately.
    Permanent,
    /// Fast-fail while the circuit breaker is open.
    CircuitOpen,
    /// Admission rejected at submit time.
    QueueFull,
    /// Terminal failure after exhausting retries.
    DeadLetter,
    /// Cancelled by the caller.
    Cancelled,
    /// Everything else (config, IO, internal).
    Other,
}

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Submission Errors (synchronous rejections)
    // ─────────────────────────────────────────────────────────────

    /// Malformed submission, rejected before entering any lane
    #[error("invalid submission: {message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },

    /// Admission control rejected the submission
    #[error("pending queue full: {pending} tasks pending, limit is {limit}")]
    QueueFull { pending: usize, limit: usize },

    /// A non-terminal task with the same dedup key already exists
    #[error("duplicate submission: task {task_id} is already in flight for this dedup key")]
    DuplicateSubmission { task_id: Uuid },

    // ─────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────

    /// Retryable backend failure
    #[error("transient backend error: {message}")]
    TransientBackend { message: String },

    /// Non-retryable backend failure
    #[error("permanent backend error: {message}")]
    PermanentBackend { message: String },

    /// Circuit breaker is open for a backend target
    #[error("circuit open for backend '{target}', retry after {retry_after:?}")]
    CircuitOpen {
        target: String,
        retry_after: Duration,
    },

    /// A single backend call exceeded the task deadline
    #[error("backend call timed out after {deadline:?}")]
    Timeout { deadline: Duration },

    // ─────────────────────────────────────────────────────────────
    // Task Lifecycle Errors
    // ─────────────────────────────────────────────────────────────

    /// Terminal failure after exhausting the retry budget
    #[error("task {task_id} dead-lettered after {attempts} attempts: {last_error}")]
    DeadLetter {
        task_id: Uuid,
        attempts: u32,
        last_error: String,
    },

    /// Task was cancelled by the caller
    #[error("task {task_id} was cancelled")]
    Cancelled { task_id: Uuid },

    /// Cancel called on a task that already reached a terminal state
    #[error("task {task_id} is already terminal: {status}")]
    AlreadyTerminal { task_id: Uuid, status: String },

    /// Task id not present in the task table
    #[error("unknown task: {0}")]
    UnknownTask(Uuid),

    /// Persona id not present in the catalog
    #[error("unknown persona: {0}")]
    PersonaNotFound(String),

    // ─────────────────────────────────────────────────────────────
    // Configuration / IO Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("toml error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the coarse classification for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Validation { .. } | Error::DuplicateSubmission { .. } => ErrorClass::Validation,
            Error::QueueFull { .. } => ErrorClass::QueueFull,
            Error::TransientBackend { .. } | Error::Timeout { .. } => ErrorClass::Transient,
            Error::PermanentBackend { .. } | Error::PersonaNotFound(_) => ErrorClass::Permanent,
            Error::CircuitOpen { .. } => ErrorClass::CircuitOpen,
            Error::DeadLetter { .. } => ErrorClass::DeadLetter,
            Error::Cancelled { .. } => ErrorClass::Cancelled,
            _ => ErrorClass::Other,
        }
    }

    /// Whether the retry policy may attempt this operation again.
    ///
    /// Circuit-open failures count as transient: the breaker cooldown and
    /// the backoff schedule run down together, and the task dead-letters
    /// with the circuit error preserved if the budget expires first.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Transient | ErrorClass::CircuitOpen
        )
    }

    /// Whether this error must propagate without consuming retry budget.
    pub fn is_permanent(&self) -> bool {
        self.class() == ErrorClass::Permanent
    }

    /// Short label used in metrics and attempt history.
    pub fn label(&self) -> &'static str {
        match self.class() {
            ErrorClass::Validation => "validation",
            ErrorClass::Transient => match self {
                Error::Timeout { .. } => "timeout",
                _ => "transient",
            },
            ErrorClass::Permanent => "permanent",
            ErrorClass::CircuitOpen => "circuit_open",
            ErrorClass::QueueFull => "queue_full",
            ErrorClass::DeadLetter => "dead_letter",
            ErrorClass::Cancelled => "cancelled",
            ErrorClass::Other => "other",
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────

    /// Create a validation error without a field reference
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error naming the offending field
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field),
        }
    }

    /// Create a transient backend error
    pub fn transient(message: impl Into<String>) -> Self {
        Error::TransientBackend {
            message: message.into(),
        }
    }

    /// Create a permanent backend error
    pub fn permanent(message: impl Into<String>) -> Self {
        Error::PermanentBackend {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
