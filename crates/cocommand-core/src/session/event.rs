use serde::{Deserialize, Serialize};

use super::{Message, MessagePart, SessionContext};

/// High-level events decoded from a `POST /sessions/command` stream.
///
/// Server-sent `error` frames never become an event; they terminate the
/// stream with a typed error instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionCommandEvent {
    /// The server accepted the command and allocated message ids.
    #[serde(rename = "message.started")]
    MessageStarted {
        user_message: Option<Message>,
        assistant_message: Message,
    },
    /// A part was created or changed.
    #[serde(rename = "part.updated")]
    PartUpdated {
        message_id: String,
        part_id: String,
        part: MessagePart,
    },
    /// The session context changed.
    #[serde(rename = "context")]
    Context { context: SessionContext },
    /// Terminal event carrying the authoritative result.
    #[serde(rename = "done")]
    Done {
        context: SessionContext,
        messages: Vec<Message>,
    },
}

impl SessionCommandEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageStarted { .. } => "message.started",
            Self::PartUpdated { .. } => "part.updated",
            Self::Context { .. } => "context",
            Self::Done { .. } => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Result of a fully drained command stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCommandResult {
    pub context: SessionContext,
    pub messages: Vec<Message>,
}

impl SessionCommandResult {
    /// Parts of every assistant message, in order.
    pub fn reply_parts(&self) -> Vec<MessagePart> {
        self.messages
            .iter()
            .filter(|message| message.is_assistant())
            .flat_map(|message| message.parts.iter().cloned())
            .collect()
    }
}
