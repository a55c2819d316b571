//! Session command protocol.
//!
//! `POST /sessions/command` answers with an SSE stream whose frames decode to
//! [`SessionCommandEvent`]s:
//!
//! | frame             | required fields                        |
//! |-------------------|----------------------------------------|
//! | `message.started` | `assistant_message` (`user_message` optional) |
//! | `part.updated`    | `message_id`, `part_id`, `part`        |
//! | `context`         | `context`                              |
//! | `done`            | `context`, `messages`                  |
//! | `error`           | never yields; ends the stream          |
//!
//! A malformed frame for a known event ends the stream with
//! `sse_parse_error`: applying a half-decoded update would corrupt the part
//! list downstream. Unknown event names are skipped.

use cocommand_core::session::{
    Message, MessagePart, SessionCommandEvent, SessionCommandInputPart, SessionCommandResult,
    SessionContext,
};
use cocommand_core::{ClientError, Result};
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::abort::RequestOptions;
use crate::sse::{self, SseData, SseFrame};
use crate::transport::{RequestSpec, Transport, extract_error};

const COMMAND_PATH: &str = "/sessions/command";
const CONTEXT_PATH: &str = "/sessions/context";
const ORIGIN_COMMAND: &str = "sessions.command";
const ORIGIN_CONTEXT: &str = "sessions.context";

pub type SessionEventStream = BoxStream<'static, Result<SessionCommandEvent>>;

#[derive(Serialize)]
struct CommandRequest<'a> {
    parts: &'a [SessionCommandInputPart],
}

#[derive(Deserialize)]
struct MessageStartedPayload {
    #[serde(default)]
    user_message: Option<Message>,
    assistant_message: Message,
}

#[derive(Deserialize)]
struct PartUpdatedPayload {
    message_id: String,
    part_id: String,
    part: MessagePart,
}

#[derive(Deserialize)]
struct ContextPayload {
    context: SessionContext,
}

#[derive(Deserialize)]
struct DonePayload {
    context: SessionContext,
    messages: Vec<Message>,
}

/// Decodes one frame of a command stream.
///
/// `Ok(None)` for event names this client does not know.
pub fn decode_session_frame(frame: &SseFrame) -> Result<Option<SessionCommandEvent>> {
    let event = match frame.event.as_str() {
        "message.started" => {
            let payload: MessageStartedPayload = frame_payload(frame)?;
            SessionCommandEvent::MessageStarted {
                user_message: payload.user_message,
                assistant_message: payload.assistant_message,
            }
        }
        "part.updated" => {
            let payload: PartUpdatedPayload = frame_payload(frame)?;
            SessionCommandEvent::PartUpdated {
                message_id: payload.message_id,
                part_id: payload.part_id,
                part: payload.part,
            }
        }
        "context" => {
            let payload: ContextPayload = frame_payload(frame)?;
            SessionCommandEvent::Context {
                context: payload.context,
            }
        }
        "done" => {
            let payload: DonePayload = frame_payload(frame)?;
            SessionCommandEvent::Done {
                context: payload.context,
                messages: payload.messages,
            }
        }
        "error" => return Err(server_error(&frame.data)),
        other => {
            tracing::debug!("[SessionStream] Ignoring unknown event: {}", other);
            return Ok(None);
        }
    };
    Ok(Some(event))
}

/// Decodes a known frame's JSON payload, failing with `sse_parse_error`.
pub(crate) fn frame_payload<T: DeserializeOwned>(frame: &SseFrame) -> Result<T> {
    let value = match &frame.data {
        SseData::Json(value) => value.clone(),
        SseData::Text(text) => {
            return Err(ClientError::sse_parse(format!(
                "Invalid {} payload: expected JSON, got {:?}",
                frame.event, text
            )));
        }
    };
    serde_json::from_value(value.clone()).map_err(|err| {
        ClientError::sse_parse(format!("Invalid {} payload: {err}", frame.event))
            .with_details(value)
    })
}

/// Builds the error for a server-sent `error` frame.
pub(crate) fn server_error(data: &SseData) -> ClientError {
    let payload = data.to_value();
    let message = extract_error(&payload)
        .map(|(_, message)| message)
        .unwrap_or_else(|| "Stream reported an error".to_string());
    ClientError::sse(message).with_details(payload)
}

/// Ends a stream after its first error or its terminal event.
pub(crate) fn until_terminal<T, S, F>(stream: S, is_terminal: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    S: futures::Stream<Item = Result<T>> + Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    stream
        .scan(false, move |stopped, item| {
            if *stopped {
                return future::ready(None);
            }
            *stopped = match &item {
                Ok(value) => is_terminal(value),
                Err(_) => true,
            };
            future::ready(Some(item))
        })
        .boxed()
}

/// Session endpoints.
pub struct SessionApi<'a> {
    transport: &'a Transport,
}

impl<'a> SessionApi<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Opens a command stream for incremental consumption.
    ///
    /// The returned stream ends after `done` or after the first error.
    pub async fn command_stream(
        &self,
        parts: &[SessionCommandInputPart],
        options: &RequestOptions,
    ) -> Result<SessionEventStream> {
        let scope = self.transport.scope(options);
        let spec = RequestSpec::post(COMMAND_PATH, ORIGIN_COMMAND).json(&CommandRequest { parts })?;
        let response = self.transport.open_stream(spec, &scope).await?;
        let frames = sse::frames(response, scope).map_err(|e| e.or_origin(ORIGIN_COMMAND))?;

        tracing::info!("[SessionStream] Command stream opened ({} parts)", parts.len());

        let events = frames.filter_map(|frame| {
            let decoded = frame.and_then(|frame| decode_session_frame(&frame));
            future::ready(match decoded {
                Ok(Some(event)) => Some(Ok(event)),
                Ok(None) => None,
                Err(err) => Some(Err(err.or_origin(ORIGIN_COMMAND))),
            })
        });

        Ok(until_terminal(events, SessionCommandEvent::is_terminal))
    }

    /// Runs a command to completion and returns the `done` payload.
    ///
    /// Fails if the stream ends without ever producing `done`.
    pub async fn command(
        &self,
        parts: &[SessionCommandInputPart],
        options: &RequestOptions,
    ) -> Result<SessionCommandResult> {
        let mut events = self.command_stream(parts, options).await?;
        while let Some(event) = events.next().await {
            if let SessionCommandEvent::Done { context, messages } = event? {
                tracing::info!(
                    "[SessionStream] Command done: session={} messages={}",
                    context.session_id,
                    messages.len()
                );
                return Ok(SessionCommandResult { context, messages });
            }
        }
        Err(
            ClientError::invalid_response("Session command stream ended without a done event")
                .with_origin(ORIGIN_COMMAND),
        )
    }

    /// Current session context.
    pub async fn context(
        &self,
        workspace_id: Option<&str>,
        session_id: Option<&str>,
        options: &RequestOptions,
    ) -> Result<SessionContext> {
        let spec = RequestSpec::get(CONTEXT_PATH, ORIGIN_CONTEXT)
            .query_opt("workspace_id", workspace_id)
            .query_opt("session_id", session_id);
        self.transport.request_json(spec, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cocommand_core::ErrorCode;
    use serde_json::json;

    fn frame(event: &str, data: Value) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: SseData::Json(data),
        }
    }

    fn message_json(id: &str, role: &str) -> Value {
        json!({
            "info": {"id": id, "session_id": "s1", "role": role, "created_at": "2024-01-01T00:00:00Z"},
            "parts": []
        })
    }

    fn context_json() -> Value {
        json!({"workspace_id": "w1", "session_id": "s1", "started_at": "2024-01-01T00:00:00Z", "ended_at": null})
    }

    #[test]
    fn test_decode_message_started() {
        let event = decode_session_frame(&frame(
            "message.started",
            json!({"assistant_message": message_json("m2", "assistant")}),
        ))
        .unwrap()
        .unwrap();
        match event {
            SessionCommandEvent::MessageStarted {
                user_message,
                assistant_message,
            } => {
                assert!(user_message.is_none());
                assert_eq!(assistant_message.id(), "m2");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_missing_assistant_message_is_parse_error() {
        let err = decode_session_frame(&frame(
            "message.started",
            json!({"user_message": message_json("m1", "user")}),
        ))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SseParseError);
    }

    #[test]
    fn test_part_updated_requires_every_field() {
        let part = json!({"type": "text", "id": "p1", "text": "hi"});
        let ok = decode_session_frame(&frame(
            "part.updated",
            json!({"message_id": "m2", "part_id": "p1", "part": part}),
        ))
        .unwrap();
        assert!(matches!(ok, Some(SessionCommandEvent::PartUpdated { .. })));

        let err = decode_session_frame(&frame(
            "part.updated",
            json!({"message_id": "m2", "part": part}),
        ))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SseParseError);
    }

    #[test]
    fn test_done_requires_messages() {
        let err = decode_session_frame(&frame("done", json!({"context": context_json()})))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SseParseError);

        let done = decode_session_frame(&frame(
            "done",
            json!({"context": context_json(), "messages": [message_json("m2", "assistant")]}),
        ))
        .unwrap()
        .unwrap();
        assert!(done.is_terminal());
    }

    #[test]
    fn test_text_payload_for_known_event_is_parse_error() {
        let err = decode_session_frame(&SseFrame {
            event: "context".into(),
            data: SseData::Text("not json".into()),
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SseParseError);
    }

    #[test]
    fn test_error_frame_shapes() {
        let nested = decode_session_frame(&frame(
            "error",
            json!({"error": {"code": "bad_request", "message": "stream failed"}}),
        ))
        .unwrap_err();
        assert_eq!(nested.code, ErrorCode::SseError);
        assert!(nested.message.contains("stream failed"));

        let flat = decode_session_frame(&frame("error", json!({"message": "flat"}))).unwrap_err();
        assert_eq!(flat.message, "flat");

        let raw = decode_session_frame(&SseFrame {
            event: "error".into(),
            data: SseData::Text("raw failure".into()),
        })
        .unwrap_err();
        assert_eq!(raw.message, "raw failure");
    }

    #[test]
    fn test_unknown_event_is_skipped() {
        assert!(
            decode_session_frame(&frame("heartbeat", json!({})))
                .unwrap()
                .is_none()
        );
    }
}
