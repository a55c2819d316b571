//! Session wire types.
//!
//! These mirror the payloads the workspace server sends and accepts on the
//! session endpoints. The client never mints message or part ids; it only
//! receives complete or partial copies of server state.
//!
//! # Module Structure
//!
//! - `context`: Logical conversation identity (`SessionContext`)
//! - `message`: Server-assigned turns (`Message`, `MessageInfo`, `MessageRole`)
//! - `part`: Reply parts and tool lifecycle (`MessagePart`, `ToolState`)
//! - `input`: Command request parts (`SessionCommandInputPart`, `SourceSpan`)
//! - `event`: Decoded command stream events (`SessionCommandEvent`)

mod context;
mod event;
mod input;
mod message;
mod part;

// Re-export public API
pub use context::SessionContext;
pub use event::{SessionCommandEvent, SessionCommandResult};
pub use input::{SessionCommandInputPart, SourceSpan};
pub use message::{Message, MessageInfo, MessageRole};
pub use part::{
    FilePart, FilePayload, MessagePart, PartKind, ReasoningPart, SourcePart, TextPart, ToolPart,
    ToolState,
};
