//! Conversation context snapshot.
//!
//! The conversation store owns the authoritative history; the engine only
//! sees a bounded, read-only snapshot taken at submission time.

use serde::{Deserialize, Serialize};

use super::message::Message;
use super::task::ExecutionResult;

/// One completed exchange: the user message and the result produced for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub message: Message,
    pub result: ExecutionResult,
}

/// Read-only snapshot of a conversation's recent history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,

    /// Prior turns, oldest first, bounded to the store's window.
    pub turns: Vec<ConversationTurn>,
}

impl ConversationContext {
    /// Empty context for a conversation with no prior turns.
    pub fn empty(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            turns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Render the history as a plain-text transcript for prompt assembly.
    pub fn render_transcript(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str("user: ");
            out.push_str(&turn.message.content);
            out.push('\n');
            out.push_str("assistant: ");
            out.push_str(&turn.result.text);
            out.push('\n');
        }
        out
    }
}
