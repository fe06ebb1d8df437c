//! Incoming chat message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single user message submitted for a conversation.
///
/// Immutable once created; tasks hold it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Conversation this message belongs to.
    pub conversation_id: String,

    /// Identifier of the sender (user id).
    pub sender_id: String,

    /// Message text.
    pub content: String,

    /// When the message was created.
    pub timestamp: DateTime<Utc>,

    /// Optional idempotency key. Two submissions with the same key for the
    /// same conversation collapse onto one task while the first is live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            dedup_key: None,
        }
    }

    /// Attach a dedup key.
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}
