use serde::{Deserialize, Serialize};

/// Literal substring of the composer text that a tagged part was rendered as,
/// with byte offsets into that text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub value: String,
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(value: impl Into<String>, start: usize) -> Self {
        let value = value.into();
        let end = start + value.len();
        Self { value, start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// One piece of a `POST /sessions/command` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SessionCommandInputPart {
    Text {
        text: String,
    },
    Extension {
        extension_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SourceSpan>,
    },
    File {
        path: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SourceSpan>,
    },
}

impl SessionCommandInputPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn extension(extension_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Extension {
            extension_id: extension_id.into(),
            name: name.into(),
            kind: None,
            source: None,
        }
    }

    pub fn file(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            name: name.into(),
            entry_type: None,
            source: None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// How a tagged part reads in the composer (`@name`, `#name`). Text reads as itself.
    pub fn display_label(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Extension { name, .. } => format!("@{name}"),
            Self::File { name, .. } => format!("#{name}"),
        }
    }

    pub fn source(&self) -> Option<&SourceSpan> {
        match self {
            Self::Text { .. } => None,
            Self::Extension { source, .. } | Self::File { source, .. } => source.as_ref(),
        }
    }

    pub fn set_source(&mut self, span: Option<SourceSpan>) {
        match self {
            Self::Text { .. } => {}
            Self::Extension { source, .. } | Self::File { source, .. } => *source = span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extension_part_wire_shape() {
        let part = SessionCommandInputPart::Extension {
            extension_id: "notes".into(),
            name: "Notes".into(),
            kind: Some("built-in".into()),
            source: None,
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(
            value,
            json!({"type": "extension", "extensionId": "notes", "name": "Notes", "kind": "built-in"})
        );
    }

    #[test]
    fn test_file_part_reads_entry_type() {
        let part: SessionCommandInputPart = serde_json::from_value(json!({
            "type": "file",
            "path": "/tmp/a.txt",
            "name": "a.txt",
            "entryType": "file"
        }))
        .unwrap();
        match part {
            SessionCommandInputPart::File { entry_type, .. } => {
                assert_eq!(entry_type.as_deref(), Some("file"))
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn test_span_offsets() {
        let span = SourceSpan::new("@Notes", 6);
        assert_eq!(span.end, 12);
        assert!(span.contains(6));
        assert!(!span.contains(12));
    }
}
