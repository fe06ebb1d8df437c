//! Persona routing and sequential conversation execution core.
//!
//! The engine accepts chat messages, selects a persona for each by weighted
//! rule matching, and executes them through a bounded worker pool. Messages
//! within one conversation run strictly in submission order; unrelated
//! conversations proceed in parallel. Backend calls are retried with
//! jittered exponential backoff behind a per-target circuit breaker, and
//! exhausted tasks are dead-lettered with their full attempt history.
//!
//! The model backend and the conversation store are ports
//! ([`backend::ModelBackend`], [`backend::ConversationStore`]); the crate
//! ships an in-memory store and a scriptable mock backend.

pub mod assembler;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod persona;
pub mod retry;
pub mod types;
pub mod version;

pub use assembler::{ConfidenceSettings, ResponseAssembler};
pub use config::EngineConfig;
pub use error::{Error, ErrorClass, Result};
pub use orchestrator::Orchestrator;
pub use persona::{PersonaCatalog, PersonaKind, PersonaRouter};
pub use types::{ExecutionResult, Message, TaskHandle, TaskStatus};
