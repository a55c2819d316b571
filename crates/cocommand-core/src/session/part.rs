//! Reply parts, the unit of incremental rendering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plain assistant output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    pub id: String,
    pub text: String,
}

/// Chain-of-thought output, rendered separately from text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningPart {
    pub id: String,
    pub text: String,
}

/// A tool call and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPart {
    pub id: String,
    #[serde(alias = "callId")]
    pub call_id: String,
    #[serde(alias = "toolName")]
    pub tool_name: String,
    pub state: ToolState,
}

/// Where an attachment's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePayload {
    Base64 {
        base64: String,
    },
    AssetRef {
        #[serde(alias = "assetRef")]
        asset_ref: String,
    },
}

/// Attachment metadata. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePart {
    pub id: String,
    #[serde(alias = "mediaType")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub payload: FilePayload,
}

/// Citation or reference. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePart {
    pub id: String,
    #[serde(alias = "sourceType")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One discrete unit of an assistant reply.
///
/// The set of variants is closed: a tag the client does not know fails to
/// deserialize instead of falling through as an opaque blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text(TextPart),
    Reasoning(ReasoningPart),
    Tool(ToolPart),
    File(FilePart),
    Source(SourcePart),
}

/// Discriminant of a [`MessagePart`], handy for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Text,
    Reasoning,
    Tool,
    File,
    Source,
}

impl MessagePart {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text(TextPart {
            id: id.into(),
            text: text.into(),
        })
    }

    pub fn reasoning(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Reasoning(ReasoningPart {
            id: id.into(),
            text: text.into(),
        })
    }

    pub fn tool(
        id: impl Into<String>,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        state: ToolState,
    ) -> Self {
        Self::Tool(ToolPart {
            id: id.into(),
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            state,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Text(part) => &part.id,
            Self::Reasoning(part) => &part.id,
            Self::Tool(part) => &part.id,
            Self::File(part) => &part.id,
            Self::Source(part) => &part.id,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Tool(part) => Some(&part.call_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> PartKind {
        match self {
            Self::Text(_) => PartKind::Text,
            Self::Reasoning(_) => PartKind::Reasoning,
            Self::Tool(_) => PartKind::Tool,
            Self::File(_) => PartKind::File,
            Self::Source(_) => PartKind::Source,
        }
    }

    /// Text and reasoning share the same shape and accumulation rules.
    pub fn is_text_like(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Reasoning(_))
    }

    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text(part) => Some(&part.text),
            Self::Reasoning(part) => Some(&part.text),
            _ => None,
        }
    }

    /// Appends to the text of a text-like part. No-op for other kinds.
    pub fn push_text(&mut self, delta: &str) {
        match self {
            Self::Text(part) => part.text.push_str(delta),
            Self::Reasoning(part) => part.text.push_str(delta),
            _ => {}
        }
    }
}

/// Lifecycle of a tool call: pending → running → (completed | error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolState {
    Pending {
        #[serde(default)]
        input: Value,
    },
    Running {
        #[serde(default)]
        input: Value,
        #[serde(alias = "startTime")]
        start_time: String,
    },
    Completed {
        #[serde(default)]
        input: Value,
        #[serde(default)]
        output: Value,
        #[serde(alias = "endTime")]
        end_time: String,
    },
    Error {
        #[serde(default)]
        input: Value,
        #[serde(alias = "errorMessage")]
        error: String,
        #[serde(alias = "endTime")]
        end_time: String,
    },
}

impl ToolState {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending { .. } => 0,
            Self::Running { .. } => 1,
            Self::Completed { .. } | Self::Error { .. } => 2,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Running { .. } => "running",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    pub fn input(&self) -> &Value {
        match self {
            Self::Pending { input }
            | Self::Running { input, .. }
            | Self::Completed { input, .. }
            | Self::Error { input, .. } => input,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Re-sending the current status is allowed (payload refresh); a terminal
    /// state never flips to the other terminal state.
    pub fn can_transition_to(&self, next: &ToolState) -> bool {
        if self.is_terminal() {
            return self.status() == next.status();
        }
        next.rank() >= self.rank()
    }
}
