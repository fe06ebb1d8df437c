//! In-memory conversation store.
//!
//! Reference implementation of [`ConversationStore`] with a bounded context
//! window, used by tests and the CLI chat loop.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{ConversationContext, ConversationTurn, ExecutionResult, Message};

use super::traits::ConversationStore;

pub struct InMemoryStore {
    window: usize,
    turns: RwLock<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryStore {
    /// `window` bounds how many prior turns a context snapshot carries.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            turns: RwLock::new(HashMap::new()),
        }
    }

    /// Total turns stored for a conversation (not window-bounded).
    pub fn turn_count(&self, conversation_id: &str) -> usize {
        self.turns
            .read()
            .get(conversation_id)
            .map(|t| t.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load_context(&self, conversation_id: &str) -> Result<ConversationContext> {
        let turns = self.turns.read();
        let history = match turns.get(conversation_id) {
            Some(history) => {
                let skip = history.len().saturating_sub(self.window);
                history[skip..].to_vec()
            }
            None => Vec::new(),
        };
        Ok(ConversationContext {
            conversation_id: conversation_id.to_string(),
            turns: history,
        })
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        message: &Message,
        result: &ExecutionResult,
    ) -> Result<()> {
        self.turns
            .write()
            .entry(conversation_id.to_string())
            .or_default()
            .push(ConversationTurn {
                message: message.clone(),
                result: result.clone(),
            });
        Ok(())
    }
}
