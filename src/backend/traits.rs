//! Port trait definitions
//!
//! The engine consumes the model backend and the conversation store through
//! these narrow traits; their real implementations live outside this crate.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConversationContext, ExecutionResult, Message};

// ─────────────────────────────────────────────────────────────────
// Model Backend
// ─────────────────────────────────────────────────────────────────

/// One model invocation.
#[derive(Debug)]
pub struct InvocationRequest<'a> {
    /// Persona system instruction.
    pub system_prompt: &'a str,

    /// The message being answered.
    pub message: &'a Message,

    /// Bounded context snapshot for the conversation.
    pub context: &'a ConversationContext,

    /// Deadline for this single call; enforced by the caller too.
    pub deadline: Duration,
}

/// Raw model output before assembly.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Response text.
    pub text: String,

    /// Model-reported confidence in [0, 1], if the backend provides one.
    pub confidence: Option<f64>,
}

/// Port to the language-model backend.
///
/// Failures must be reported as `Error::TransientBackend` (retryable) or
/// `Error::PermanentBackend` (surfaced immediately); any other variant is
/// treated as non-retryable.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend target name, used as the circuit-breaker key.
    fn name(&self) -> &str;

    /// Invoke the model. Implementations should respect
    /// `request.deadline` cooperatively; the engine also enforces it with a
    /// hard timeout.
    async fn invoke(&self, request: InvocationRequest<'_>) -> Result<ModelOutput>;
}

// ─────────────────────────────────────────────────────────────────
// Conversation Store
// ─────────────────────────────────────────────────────────────────

/// Port to the conversation history store.
///
/// The store owns the history; the engine reads bounded snapshots and hands
/// back completed turns for persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the bounded context snapshot for a conversation. Unknown
    /// conversations yield an empty context.
    async fn load_context(&self, conversation_id: &str) -> Result<ConversationContext>;

    /// Append one completed turn.
    async fn append_turn(
        &self,
        conversation_id: &str,
        message: &Message,
        result: &ExecutionResult,
    ) -> Result<()>;
}
