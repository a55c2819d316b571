//! Workspace-wide runtime events from the `/events` stream.
//!
//! Unlike command streams, these are ambient: every event is tagged with the
//! session (and usually the run) it belongs to, and surfaces filter what they
//! care about.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{Message, MessagePart, SessionContext};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    MessageStarted {
        session_id: String,
        run_id: Option<String>,
        user_message: Option<Message>,
        assistant_message: Message,
    },
    PartUpdated {
        session_id: String,
        run_id: Option<String>,
        message_id: String,
        part_id: String,
        part: MessagePart,
    },
    RunCompleted {
        session_id: String,
        run_id: Option<String>,
    },
    RunCancelled {
        session_id: String,
        run_id: Option<String>,
        reason: Option<String>,
    },
    /// Any `background-job.<phase>` frame.
    BackgroundJob {
        session_id: String,
        run_id: Option<String>,
        phase: String,
        job_id: String,
        status: Option<String>,
        payload: Value,
    },
    Context {
        session_id: String,
        run_id: Option<String>,
        context: SessionContext,
    },
}

impl RuntimeEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::MessageStarted { session_id, .. }
            | Self::PartUpdated { session_id, .. }
            | Self::RunCompleted { session_id, .. }
            | Self::RunCancelled { session_id, .. }
            | Self::BackgroundJob { session_id, .. }
            | Self::Context { session_id, .. } => session_id,
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::MessageStarted { run_id, .. }
            | Self::PartUpdated { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunCancelled { run_id, .. }
            | Self::BackgroundJob { run_id, .. }
            | Self::Context { run_id, .. } => run_id.as_deref(),
        }
    }

    /// Run lifecycle end, either way.
    pub fn ends_run(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunCancelled { .. })
    }
}

/// Routing tags present on every runtime frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeTags {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    #[serde(default, alias = "runId")]
    pub run_id: Option<String>,
}
