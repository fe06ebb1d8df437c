//! Core data types shared across the engine.

mod context;
mod message;
mod task;

pub use context::{ConversationContext, ConversationTurn};
pub use message::Message;
pub use task::{AttemptRecord, ExecutionResult, Task, TaskHandle, TaskStatus};
