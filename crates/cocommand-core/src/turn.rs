//! Client-side bookkeeping for submitted commands.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{MessagePart, SessionCommandInputPart};

pub const DEFAULT_TURN_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Streaming,
    Complete,
    Error,
}

/// One user submission and the reply assembled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTurn {
    /// Client-minted; never a server id.
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    pub input: Vec<SessionCommandInputPart>,
    pub parts: Vec<MessagePart>,
    pub status: TurnStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandTurn {
    pub fn start(input: Vec<SessionCommandInputPart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            submitted_at: Utc::now(),
            input,
            parts: Vec::new(),
            status: TurnStatus::Streaming,
            error: None,
        }
    }

    pub fn complete(&mut self, parts: Vec<MessagePart>) {
        self.parts = parts;
        self.status = TurnStatus::Complete;
        self.error = None;
    }

    /// Marks the turn failed, keeping whatever parts already arrived.
    pub fn fail(&mut self, parts: Vec<MessagePart>, message: impl Into<String>) {
        self.parts = parts;
        self.status = TurnStatus::Error;
        self.error = Some(message.into());
    }

    pub fn is_streaming(&self) -> bool {
        self.status == TurnStatus::Streaming
    }
}

/// Bounded turn log; the oldest turns are evicted first.
#[derive(Debug, Clone)]
pub struct TurnHistory {
    turns: VecDeque<CommandTurn>,
    limit: usize,
}

impl Default for TurnHistory {
    fn default() -> Self {
        Self::new(DEFAULT_TURN_LIMIT)
    }
}

impl TurnHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, turn: CommandTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CommandTurn> {
        self.turns.iter_mut().find(|turn| turn.id == id)
    }

    /// Drops a turn, used when a submission is abandoned without a result.
    pub fn remove(&mut self, id: &str) -> Option<CommandTurn> {
        let index = self.turns.iter().position(|turn| turn.id == id)?;
        self.turns.remove(index)
    }

    pub fn latest(&self) -> Option<&CommandTurn> {
        self.turns.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandTurn> {
        self.turns.iter()
    }

    pub fn to_vec(&self) -> Vec<CommandTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_ids_are_unique() {
        let a = CommandTurn::start(vec![SessionCommandInputPart::text("a")]);
        let b = CommandTurn::start(vec![SessionCommandInputPart::text("a")]);
        assert_ne!(a.id, b.id);
        assert!(a.is_streaming());
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = TurnHistory::new(2);
        let first = CommandTurn::start(vec![SessionCommandInputPart::text("1")]);
        let first_id = first.id.clone();
        history.push(first);
        history.push(CommandTurn::start(vec![SessionCommandInputPart::text("2")]));
        history.push(CommandTurn::start(vec![SessionCommandInputPart::text("3")]));

        assert_eq!(history.len(), 2);
        assert!(history.get_mut(&first_id).is_none());
    }

    #[test]
    fn test_fail_keeps_parts() {
        let mut turn = CommandTurn::start(vec![]);
        turn.fail(vec![MessagePart::text("p1", "partial")], "stream failed");
        assert_eq!(turn.status, TurnStatus::Error);
        assert_eq!(turn.parts.len(), 1);
        assert_eq!(turn.error.as_deref(), Some("stream failed"));
    }
}
