use serde::{Deserialize, Serialize};

/// Identifies one logical conversation on the server.
///
/// Replaced wholesale whenever the server emits a new one; never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub workspace_id: String,
    pub session_id: String,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
}

impl SessionContext {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}
