//! Sigil detection for the command bar's suggestion panels.

/// Which suggestion panel a sigil opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    /// `@`: extension mention
    Mention,
    /// `/`: command
    Command,
    /// `#`: file reference
    File,
    /// `*`: application
    Application,
}

impl SuggestionKind {
    pub fn from_sigil(sigil: char) -> Option<Self> {
        match sigil {
            '@' => Some(Self::Mention),
            '/' => Some(Self::Command),
            '#' => Some(Self::File),
            '*' => Some(Self::Application),
            _ => None,
        }
    }

    pub fn sigil(&self) -> char {
        match self {
            Self::Mention => '@',
            Self::Command => '/',
            Self::File => '#',
            Self::Application => '*',
        }
    }
}

/// An active sigil token ending at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionTrigger {
    pub kind: SuggestionKind,
    /// Text typed after the sigil, up to the cursor.
    pub query: String,
    /// Byte offset of the sigil.
    pub start: usize,
}

/// Finds the sigil token the cursor is in, if any.
///
/// A sigil only counts at the start of the text or right after whitespace, and
/// the token runs from the sigil to the cursor without whitespace in between.
pub fn active_trigger(text: &str, cursor: usize) -> Option<SuggestionTrigger> {
    let cursor = cursor.min(text.len());
    let head = text.get(..cursor)?;
    let token_start = head
        .char_indices()
        .rev()
        .find(|(_, ch)| ch.is_whitespace())
        .map(|(index, ch)| index + ch.len_utf8())
        .unwrap_or(0);
    let token = &head[token_start..];
    let sigil = token.chars().next()?;
    let kind = SuggestionKind::from_sigil(sigil)?;

    Some(SuggestionTrigger {
        kind,
        query: token[sigil.len_utf8()..].to_string(),
        start: token_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_each_sigil() {
        for (text, kind) in [
            ("@no", SuggestionKind::Mention),
            ("/set", SuggestionKind::Command),
            ("#rea", SuggestionKind::File),
            ("*saf", SuggestionKind::Application),
        ] {
            let trigger = active_trigger(text, text.len()).unwrap();
            assert_eq!(trigger.kind, kind);
            assert_eq!(trigger.start, 0);
            assert_eq!(trigger.query, &text[1..]);
        }
    }

    #[test]
    fn test_sigil_after_whitespace_only() {
        let text = "mail me@host";
        assert!(active_trigger(text, text.len()).is_none());

        let text = "open @notes";
        let trigger = active_trigger(text, text.len()).unwrap();
        assert_eq!(trigger.start, 5);
        assert_eq!(trigger.query, "notes");
    }

    #[test]
    fn test_whitespace_closes_token() {
        let text = "@notes ";
        assert!(active_trigger(text, text.len()).is_none());
        // Cursor back inside the token reopens it
        assert_eq!(active_trigger(text, 3).unwrap().query, "no");
    }

    #[test]
    fn test_bare_sigil_has_empty_query() {
        let trigger = active_trigger("/", 1).unwrap();
        assert_eq!(trigger.kind, SuggestionKind::Command);
        assert!(trigger.query.is_empty());
    }
}
