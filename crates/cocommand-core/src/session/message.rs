//! Conversation message types.

use serde::{Deserialize, Serialize};

use super::part::MessagePart;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Server-assigned metadata for a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// A single turn as the server sees it: metadata plus ordered parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn is_assistant(&self) -> bool {
        self.info.role == MessageRole::Assistant
    }
}
