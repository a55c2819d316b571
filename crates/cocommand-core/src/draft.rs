//! Composer draft bookkeeping.
//!
//! A draft is the ordered list of input parts the user is composing: text
//! spans interleaved with tagged extension/file references. Two invariants
//! hold after every mutation:
//!
//! - the last part is always a text part (possibly empty), so typing has
//!   somewhere to go;
//! - no two text parts are adjacent.
//!
//! Tagged parts carry the `SourceSpan` they occupy in the rendered composer
//! text, which is what click-to-remove and backspace-to-delete key off.

use serde::{Deserialize, Serialize};

use crate::session::{SessionCommandInputPart, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftInput {
    parts: Vec<SessionCommandInputPart>,
}

impl Default for DraftInput {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftInput {
    /// An empty draft: a single empty text part.
    pub fn new() -> Self {
        Self {
            parts: vec![SessionCommandInputPart::text("")],
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![SessionCommandInputPart::text(text)],
        }
    }

    /// Builds a draft from arbitrary parts, normalizing them.
    pub fn from_parts(parts: Vec<SessionCommandInputPart>) -> Self {
        let mut draft = Self { parts };
        draft.normalize();
        draft
    }

    pub fn parts(&self) -> &[SessionCommandInputPart] {
        &self.parts
    }

    /// Replaces the whole draft, normalizing the new parts.
    pub fn commit(&mut self, parts: Vec<SessionCommandInputPart>) {
        self.parts = parts;
        self.normalize();
    }

    /// Text of the trailing part, where typing goes.
    pub fn active_text(&self) -> &str {
        self.parts
            .last()
            .and_then(SessionCommandInputPart::as_text)
            .unwrap_or("")
    }

    /// Replaces the trailing text part's content.
    pub fn set_active_text(&mut self, text: impl Into<String>) {
        if let Some(SessionCommandInputPart::Text { text: current }) = self.parts.last_mut() {
            *current = text.into();
        } else {
            self.parts.push(SessionCommandInputPart::text(text));
        }
    }

    /// Appends a tagged part after the current text and opens a fresh empty
    /// text part behind it.
    pub fn attach(&mut self, part: SessionCommandInputPart) {
        self.parts.push(part);
        self.normalize();
    }

    /// The composer text as rendered: text verbatim, tagged parts by label.
    pub fn render(&self) -> String {
        self.parts
            .iter()
            .map(SessionCommandInputPart::display_label)
            .collect()
    }

    pub fn has_attachments(&self) -> bool {
        self.parts.iter().any(|part| !part.is_text())
    }

    /// True when submitting would send nothing meaningful.
    pub fn is_blank(&self) -> bool {
        !self.has_attachments() && self.render().trim().is_empty()
    }

    /// Removes the tagged part recorded at exactly `start..end`.
    pub fn remove_by_span(&mut self, start: usize, end: usize) -> bool {
        let position = self.parts.iter().position(|part| {
            part.source()
                .is_some_and(|span| span.start == start && span.end == end)
        });
        match position {
            Some(index) => {
                self.parts.remove(index);
                self.normalize();
                true
            }
            None => false,
        }
    }

    /// Removes the tagged part whose rendered span covers `offset` (click-to-remove).
    pub fn remove_at(&mut self, offset: usize) -> bool {
        let span = self
            .parts
            .iter()
            .filter_map(SessionCommandInputPart::source)
            .find(|span| span.contains(offset))
            .map(|span| (span.start, span.end));
        match span {
            Some((start, end)) => self.remove_by_span(start, end),
            None => false,
        }
    }

    /// Backspace on an empty trailing text deletes the tagged part before it.
    pub fn backspace(&mut self) -> bool {
        if !self.active_text().is_empty() || self.parts.len() < 2 {
            return false;
        }
        let index = self.parts.len() - 2;
        if self.parts[index].is_text() {
            return false;
        }
        self.parts.remove(index);
        self.normalize();
        true
    }

    /// Parts to send: empty text fragments are dropped.
    pub fn to_input_parts(&self) -> Vec<SessionCommandInputPart> {
        self.parts
            .iter()
            .filter(|part| !matches!(part.as_text(), Some("")))
            .cloned()
            .collect()
    }

    fn normalize(&mut self) {
        let mut merged: Vec<SessionCommandInputPart> = Vec::with_capacity(self.parts.len() + 1);
        for part in self.parts.drain(..) {
            match (merged.last_mut(), part) {
                (
                    Some(SessionCommandInputPart::Text { text: previous }),
                    SessionCommandInputPart::Text { text },
                ) => previous.push_str(&text),
                (_, part) => merged.push(part),
            }
        }
        if !merged.last().is_some_and(SessionCommandInputPart::is_text) {
            merged.push(SessionCommandInputPart::text(""));
        }

        let mut offset = 0;
        for part in merged.iter_mut() {
            let label = part.display_label();
            if !part.is_text() {
                part.set_source(Some(SourceSpan::new(label.clone(), offset)));
            }
            offset += label.len();
        }
        self.parts = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes() -> SessionCommandInputPart {
        SessionCommandInputPart::extension("notes", "Notes")
    }

    #[test]
    fn test_new_draft_has_trailing_text() {
        let draft = DraftInput::new();
        assert_eq!(draft.parts().len(), 1);
        assert_eq!(draft.active_text(), "");
        assert!(draft.is_blank());
    }

    #[test]
    fn test_commit_appends_empty_trailing_text() {
        let mut draft = DraftInput::new();
        draft.commit(vec![SessionCommandInputPart::text("hello "), notes()]);

        assert_eq!(draft.parts().len(), 3);
        assert_eq!(draft.active_text(), "");
        assert_eq!(draft.render(), "hello @Notes");
    }

    #[test]
    fn test_remove_by_span_restores_text() {
        let mut draft = DraftInput::from_text("hello ");
        draft.attach(notes());
        let span = draft.parts()[1].source().cloned().unwrap();
        assert_eq!(span.value, "@Notes");
        assert_eq!((span.start, span.end), (6, 12));

        assert!(draft.remove_by_span(span.start, span.end));
        assert_eq!(draft.render(), "hello ");
        assert_eq!(draft.parts().len(), 1);
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let mut draft = DraftInput::from_text("a");
        draft.attach(notes());
        draft.set_active_text(" b");
        draft.attach(SessionCommandInputPart::file("/tmp/c.txt", "c.txt"));
        draft.set_active_text(" d");

        // Removing the extension joins "a" and " b"
        let span = draft.parts()[1].source().cloned().unwrap();
        assert!(draft.remove_by_span(span.start, span.end));
        assert_eq!(draft.parts()[0].as_text(), Some("a b"));
        assert_eq!(draft.render(), "a b#c.txt d");
        // File span is recomputed after the removal
        let file_span = draft.parts()[1].source().unwrap();
        assert_eq!(file_span.start, 3);
    }

    #[test]
    fn test_remove_at_and_backspace() {
        let mut draft = DraftInput::from_text("hi ");
        draft.attach(notes());
        assert!(!draft.remove_at(0));
        assert!(draft.remove_at(4));
        assert_eq!(draft.render(), "hi ");

        draft.attach(notes());
        assert!(draft.backspace());
        assert_eq!(draft.render(), "hi ");
        assert!(!draft.backspace());
    }

    #[test]
    fn test_to_input_parts_skips_empty_text() {
        let mut draft = DraftInput::new();
        draft.attach(notes());
        let parts = draft.to_input_parts();
        assert_eq!(parts.len(), 1);
        assert!(!parts[0].is_text());
        assert!(!draft.is_blank());
    }
}
