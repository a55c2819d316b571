//! Response assembly.
//!
//! Folds decoded stream events into the ordered part list shown for the
//! in-flight turn. The list only ever grows or has entries replaced in place:
//! a part keeps the position of its first appearance for the rest of the turn.

use cocommand_core::session::{MessagePart, SessionCommandEvent, SessionContext};

/// What an applied event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyUpdate {
    /// Message ids recorded; nothing visible changed.
    Started,
    Appended(usize),
    Replaced(usize),
    /// Stale or foreign update that was dropped.
    Ignored,
    Context,
    Done,
}

impl AssemblyUpdate {
    pub fn changes_parts(&self) -> bool {
        matches!(self, Self::Appended(_) | Self::Replaced(_) | Self::Done)
    }
}

/// Updates `parts` with `part`, matching first by part id, then by tool call id.
///
/// A tool update that would move its lifecycle backwards (e.g. `completed` →
/// `running`) is dropped.
pub fn upsert_part(parts: &mut Vec<MessagePart>, part_id: &str, part: MessagePart) -> AssemblyUpdate {
    let by_id = parts
        .iter()
        .position(|existing| existing.id() == part_id || existing.id() == part.id());
    let by_call_id = || {
        let call_id = part.call_id()?;
        parts
            .iter()
            .position(|existing| existing.call_id() == Some(call_id))
    };

    let Some(index) = by_id.or_else(by_call_id) else {
        parts.push(part);
        return AssemblyUpdate::Appended(parts.len() - 1);
    };

    if let (MessagePart::Tool(current), MessagePart::Tool(next)) = (&parts[index], &part) {
        if !current.state.can_transition_to(&next.state) {
            tracing::warn!(
                "[ResponseAssembler] Dropping tool update {} -> {} for call {}",
                current.state.status(),
                next.state.status(),
                current.call_id
            );
            return AssemblyUpdate::Ignored;
        }
    }

    parts[index] = part;
    AssemblyUpdate::Replaced(index)
}

/// Id-based assembler for `sessions/command` streams.
#[derive(Debug, Clone, Default)]
pub struct ResponseAssembler {
    parts: Vec<MessagePart>,
    context: Option<SessionContext>,
    user_message_id: Option<String>,
    assistant_message_id: Option<String>,
    done: bool,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the context the surface already knows.
    pub fn with_context(context: Option<SessionContext>) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<MessagePart> {
        self.parts
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn assistant_message_id(&self) -> Option<&str> {
        self.assistant_message_id.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn apply(&mut self, event: SessionCommandEvent) -> AssemblyUpdate {
        match event {
            SessionCommandEvent::MessageStarted {
                user_message,
                assistant_message,
            } => {
                self.user_message_id = user_message.map(|message| message.info.id);
                self.assistant_message_id = Some(assistant_message.info.id);
                AssemblyUpdate::Started
            }
            SessionCommandEvent::PartUpdated {
                message_id,
                part_id,
                part,
            } => {
                // The user's own message is echoed back; its parts are not reply parts
                if self.user_message_id.as_deref() == Some(message_id.as_str()) {
                    tracing::debug!("[ResponseAssembler] Skipping user message part {}", part_id);
                    return AssemblyUpdate::Ignored;
                }
                upsert_part(&mut self.parts, &part_id, part)
            }
            SessionCommandEvent::Context { context } => {
                self.context = Some(context);
                AssemblyUpdate::Context
            }
            SessionCommandEvent::Done { context, messages } => {
                let mut replies = messages
                    .into_iter()
                    .filter(|message| message.is_assistant())
                    .peekable();
                if replies.peek().is_some() {
                    self.parts = replies.flat_map(|message| message.parts).collect();
                } else {
                    tracing::debug!("[ResponseAssembler] done carried no reply; keeping stream parts");
                }
                self.context = Some(context);
                self.done = true;
                AssemblyUpdate::Done
            }
        }
    }
}

/// One piece of an id-less stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaPiece {
    TextDelta(String),
    ReasoningDelta(String),
    /// A complete part (tool call, file, source...).
    Part(MessagePart),
}

/// Assembler for surfaces whose wire format carries no part ids.
///
/// A text or reasoning delta extends the last part only when that part is of
/// the same kind; anything in between starts a new part. Tool parts still
/// merge by call id so a result lands on its call.
#[derive(Debug, Clone, Default)]
pub struct DeltaAssembler {
    parts: Vec<MessagePart>,
    minted: usize,
}

impl DeltaAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<MessagePart> {
        self.parts
    }

    pub fn apply(&mut self, piece: DeltaPiece) -> AssemblyUpdate {
        match piece {
            DeltaPiece::TextDelta(delta) => self.extend_or_start(delta, false),
            DeltaPiece::ReasoningDelta(delta) => self.extend_or_start(delta, true),
            DeltaPiece::Part(part) => {
                if part.call_id().is_some() {
                    let id = part.id().to_string();
                    upsert_part(&mut self.parts, &id, part)
                } else {
                    self.parts.push(part);
                    AssemblyUpdate::Appended(self.parts.len() - 1)
                }
            }
        }
    }

    fn extend_or_start(&mut self, delta: String, reasoning: bool) -> AssemblyUpdate {
        let last_matches = match self.parts.last() {
            Some(MessagePart::Text(_)) => !reasoning,
            Some(MessagePart::Reasoning(_)) => reasoning,
            _ => false,
        };
        if last_matches {
            let index = self.parts.len() - 1;
            self.parts[index].push_text(&delta);
            return AssemblyUpdate::Replaced(index);
        }

        self.minted += 1;
        let part = if reasoning {
            MessagePart::reasoning(format!("reasoning-{}", self.minted), delta)
        } else {
            MessagePart::text(format!("text-{}", self.minted), delta)
        };
        self.parts.push(part);
        AssemblyUpdate::Appended(self.parts.len() - 1)
    }
}
