use std::io::{self, Write};

use cocommand_core::session::{FilePayload, MessagePart, ToolState};
use colored::Colorize;
use serde_json::Value;

const OUTPUT_PREVIEW_CHARS: usize = 120;

/// One-line summary for parts that are not streamed as prose.
pub fn describe_part(part: &MessagePart) -> String {
    match part {
        MessagePart::Text(text) => text.text.clone(),
        MessagePart::Reasoning(reasoning) => reasoning.text.clone(),
        MessagePart::Tool(tool) => {
            let detail = match &tool.state {
                ToolState::Pending { .. } | ToolState::Running { .. } => String::new(),
                ToolState::Completed { output, .. } => format!(" → {}", preview(output)),
                ToolState::Error { error, .. } => format!(" → {}", error),
            };
            format!("⚙ {} [{}]{}", tool.tool_name, tool.state.status(), detail)
        }
        MessagePart::File(file) => {
            let name = file.name.as_deref().unwrap_or("attachment");
            let location = match &file.payload {
                FilePayload::Base64 { .. } => "inline".to_string(),
                FilePayload::AssetRef { asset_ref } => asset_ref.clone(),
            };
            format!("📎 {} ({}, {})", name, file.media_type, location)
        }
        MessagePart::Source(source) => {
            let label = source
                .title
                .as_deref()
                .or(source.url.as_deref())
                .or(source.filename.as_deref())
                .unwrap_or(&source.source_type);
            format!("🔗 {}", label)
        }
    }
}

fn preview(value: &Value) -> String {
    let compact = value.to_string();
    if compact.chars().count() <= OUTPUT_PREVIEW_CHARS {
        return compact;
    }
    let mut cut: String = compact.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

/// Prints a growing part list incrementally.
///
/// Text that only grew prints its new suffix; anything else that changed is
/// printed again on its own line.
pub struct PartPrinter<W: Write> {
    out: W,
    shown: Vec<(String, String)>,
}

impl PartPrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> PartPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: Vec::new(),
        }
    }

    pub fn show(&mut self, parts: &[MessagePart]) -> io::Result<()> {
        for (index, part) in parts.iter().enumerate() {
            let rendered = describe_part(part);
            let previous = self.shown.get(index);
            if previous.is_some_and(|(id, text)| id == part.id() && *text == rendered) {
                continue;
            }

            let grew = previous.filter(|(id, text)| {
                part.is_text_like() && id == part.id() && rendered.starts_with(text.as_str())
            });
            match grew {
                Some((_, text)) => {
                    let suffix = &rendered[text.len()..];
                    write!(self.out, "{}", styled(part, suffix))?;
                }
                None => {
                    if !self.shown.is_empty() {
                        writeln!(self.out)?;
                    }
                    write!(self.out, "{}", styled(part, &rendered))?;
                }
            }

            let entry = (part.id().to_string(), rendered);
            if index < self.shown.len() {
                self.shown[index] = entry;
            } else {
                self.shown.push(entry);
            }
        }
        self.out.flush()
    }

    /// Ends the current line and forgets what was shown.
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.shown.is_empty() {
            writeln!(self.out)?;
        }
        self.shown.clear();
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn styled(part: &MessagePart, text: &str) -> String {
    match part {
        MessagePart::Text(_) => text.to_string(),
        MessagePart::Reasoning(_) => text.bright_black().italic().to_string(),
        MessagePart::Tool(tool) if matches!(tool.state, ToolState::Error { .. }) => {
            text.red().to_string()
        }
        MessagePart::Tool(_) => text.yellow().to_string(),
        MessagePart::File(_) => text.cyan().to_string(),
        MessagePart::Source(_) => text.blue().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn printed(steps: &[Vec<MessagePart>]) -> String {
        colored::control::set_override(false);
        let mut printer = PartPrinter::new(Vec::new());
        for parts in steps {
            printer.show(parts).unwrap();
        }
        printer.finish().unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_growing_text_prints_suffix_only() {
        let output = printed(&[
            vec![MessagePart::text("p1", "Hel")],
            vec![MessagePart::text("p1", "Hello")],
            vec![MessagePart::text("p1", "Hello")],
        ]);
        assert_eq!(output, "Hello\n");
    }

    #[test]
    fn test_tool_status_change_reprints_line() {
        let running = MessagePart::tool(
            "p2",
            "c1",
            "notes.create",
            ToolState::Running {
                input: json!({}),
                start_time: "t0".into(),
            },
        );
        let completed = MessagePart::tool(
            "p2",
            "c1",
            "notes.create",
            ToolState::Completed {
                input: json!({}),
                output: json!({"id": "n1"}),
                end_time: "t1".into(),
            },
        );
        let output = printed(&[
            vec![MessagePart::text("p1", "Working")],
            vec![MessagePart::text("p1", "Working"), running],
            vec![MessagePart::text("p1", "Working"), completed],
        ]);
        assert_eq!(
            output,
            "Working\n⚙ notes.create [running]\n⚙ notes.create [completed] → {\"id\":\"n1\"}\n"
        );
    }

    #[test]
    fn test_long_tool_output_is_truncated() {
        let output = json!({"body": "x".repeat(500)});
        let line = describe_part(&MessagePart::tool(
            "p1",
            "c1",
            "clipboard.read",
            ToolState::Completed {
                input: json!({}),
                output,
                end_time: "t".into(),
            },
        ));
        assert!(line.ends_with('…'));
        assert!(line.chars().count() < 200);
    }
}
