//! Up/down recall of previously submitted inputs.

use std::collections::VecDeque;

use crate::draft::DraftInput;
use crate::session::SessionCommandInputPart;

/// Submitted inputs, oldest first, with a navigation cursor.
///
/// Navigation starts from whatever is in the composer; that draft is stashed
/// and handed back when the user walks down past the newest entry.
#[derive(Debug, Clone)]
pub struct InputHistory {
    entries: VecDeque<Vec<SessionCommandInputPart>>,
    limit: usize,
    cursor: Option<usize>,
    stash: Option<DraftInput>,
}

impl InputHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
            cursor: None,
            stash: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_navigating(&self) -> bool {
        self.cursor.is_some()
    }

    /// Records a submitted input. Repeating the newest entry is a no-op.
    pub fn push(&mut self, parts: Vec<SessionCommandInputPart>) {
        self.reset();
        if parts.is_empty() || self.entries.back() == Some(&parts) {
            return;
        }
        self.entries.push_back(parts);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Steps to the previous (older) entry. Returns the draft to show, or
    /// `None` when there is nothing older.
    pub fn up(&mut self, current: &DraftInput) -> Option<DraftInput> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => {
                self.stash = Some(current.clone());
                self.entries.len() - 1
            }
            Some(0) => return None,
            Some(index) => index - 1,
        };
        self.cursor = Some(next);
        Some(DraftInput::from_parts(self.entries[next].clone()))
    }

    /// Steps to the next (newer) entry, restoring the stashed draft once the
    /// newest entry is passed.
    pub fn down(&mut self) -> Option<DraftInput> {
        let index = self.cursor?;
        if index + 1 < self.entries.len() {
            self.cursor = Some(index + 1);
            return Some(DraftInput::from_parts(self.entries[index + 1].clone()));
        }
        self.cursor = None;
        Some(self.stash.take().unwrap_or_default())
    }

    /// Leaves navigation mode without restoring anything (e.g. the user typed).
    pub fn reset(&mut self) {
        self.cursor = None;
        self.stash = None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reset();
    }
}
