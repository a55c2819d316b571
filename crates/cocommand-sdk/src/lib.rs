//! HTTP/SSE client for the Cocommand workspace server.
//!
//! Layers, leaf first:
//!
//! - `sse`: byte stream → frames
//! - `abort` / `transport`: requests, cancellation, error classification
//! - `session`: command stream protocol decoding
//! - `events`, `workspace`: ambient events and auxiliary resources
//! - `client`: the handle that ties them together

pub mod abort;
pub mod client;
pub mod events;
pub mod session;
pub mod sse;
pub mod transport;
pub mod workspace;

pub use abort::{AbortCause, AbortScope, RequestOptions};
pub use client::CocommandClient;
pub use session::{SessionApi, SessionEventStream, decode_session_frame};
pub use sse::{SseData, SseDecoder, SseFrame};
