//! Workspace-wide runtime events (`GET /events`).

use cocommand_core::runtime_event::{RuntimeEvent, RuntimeTags};
use cocommand_core::session::{Message, MessagePart, SessionContext};
use cocommand_core::{ClientError, Result};
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::abort::RequestOptions;
use crate::session::{frame_payload, server_error};
use crate::sse::{self, SseFrame};
use crate::transport::{RequestSpec, Transport};

const EVENTS_PATH: &str = "/events";
const ORIGIN_EVENTS: &str = "events.subscribe";
const BACKGROUND_JOB_PREFIX: &str = "background-job.";

pub type RuntimeEventStream = BoxStream<'static, Result<RuntimeEvent>>;

#[derive(Deserialize)]
struct MessageStartedPayload {
    #[serde(flatten)]
    tags: RuntimeTags,
    #[serde(default)]
    user_message: Option<Message>,
    assistant_message: Message,
}

#[derive(Deserialize)]
struct PartUpdatedPayload {
    #[serde(flatten)]
    tags: RuntimeTags,
    message_id: String,
    part_id: String,
    part: MessagePart,
}

#[derive(Deserialize)]
struct RunCancelledPayload {
    #[serde(flatten)]
    tags: RuntimeTags,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct BackgroundJobPayload {
    #[serde(flatten)]
    tags: RuntimeTags,
    #[serde(alias = "jobId")]
    job_id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct ContextPayload {
    #[serde(flatten)]
    tags: RuntimeTags,
    context: SessionContext,
}

/// Decodes one `/events` frame. `Ok(None)` for unknown event names.
pub fn decode_runtime_frame(frame: &SseFrame) -> Result<Option<RuntimeEvent>> {
    let event = match frame.event.as_str() {
        "message.started" => {
            let payload: MessageStartedPayload = frame_payload(frame)?;
            RuntimeEvent::MessageStarted {
                session_id: payload.tags.session_id,
                run_id: payload.tags.run_id,
                user_message: payload.user_message,
                assistant_message: payload.assistant_message,
            }
        }
        "part.updated" => {
            let payload: PartUpdatedPayload = frame_payload(frame)?;
            RuntimeEvent::PartUpdated {
                session_id: payload.tags.session_id,
                run_id: payload.tags.run_id,
                message_id: payload.message_id,
                part_id: payload.part_id,
                part: payload.part,
            }
        }
        "run.completed" => {
            let tags: RuntimeTags = frame_payload(frame)?;
            RuntimeEvent::RunCompleted {
                session_id: tags.session_id,
                run_id: tags.run_id,
            }
        }
        "run.cancelled" => {
            let payload: RunCancelledPayload = frame_payload(frame)?;
            RuntimeEvent::RunCancelled {
                session_id: payload.tags.session_id,
                run_id: payload.tags.run_id,
                reason: payload.reason,
            }
        }
        "context" => {
            let payload: ContextPayload = frame_payload(frame)?;
            RuntimeEvent::Context {
                session_id: payload.tags.session_id,
                run_id: payload.tags.run_id,
                context: payload.context,
            }
        }
        "error" => return Err(server_error(&frame.data)),
        name => match name.strip_prefix(BACKGROUND_JOB_PREFIX) {
            Some(phase) if !phase.is_empty() => {
                let payload: BackgroundJobPayload = frame_payload(frame)?;
                RuntimeEvent::BackgroundJob {
                    session_id: payload.tags.session_id,
                    run_id: payload.tags.run_id,
                    phase: phase.to_string(),
                    job_id: payload.job_id,
                    status: payload.status,
                    payload: frame.data.as_json().cloned().unwrap_or(Value::Null),
                }
            }
            _ => {
                tracing::debug!("[EventsStream] Ignoring unknown event: {}", name);
                return Ok(None);
            }
        },
    };
    Ok(Some(event))
}

/// `/events` endpoint.
pub struct EventsApi<'a> {
    transport: &'a Transport,
}

impl<'a> EventsApi<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Subscribes to runtime events, optionally filtered server-side to one session.
    ///
    /// The stream is long-lived; it ends when the server closes it, on the
    /// first error, or when `options.cancel` fires.
    pub async fn subscribe(
        &self,
        session_id: Option<&str>,
        options: &RequestOptions,
    ) -> Result<RuntimeEventStream> {
        let scope = self.transport.scope(options);
        let spec = RequestSpec::get(EVENTS_PATH, ORIGIN_EVENTS).query_opt("session_id", session_id);
        let response = self.transport.open_stream(spec, &scope).await?;
        let frames = sse::frames(response, scope).map_err(|e| e.or_origin(ORIGIN_EVENTS))?;

        let events = frames.filter_map(|frame| {
            let decoded = frame.and_then(|frame| decode_runtime_frame(&frame));
            future::ready(match decoded {
                Ok(Some(event)) => Some(Ok(event)),
                Ok(None) => None,
                Err(err) => Some(Err(err.or_origin(ORIGIN_EVENTS))),
            })
        });

        Ok(crate::session::until_terminal(events, |_: &RuntimeEvent| false))
    }
}

/// True when `error` only means the subscription was torn down on purpose.
pub fn is_subscription_closed(error: &ClientError) -> bool {
    error.is_aborted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::SseData;
    use cocommand_core::ErrorCode;
    use serde_json::json;

    fn frame(event: &str, data: Value) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: SseData::Json(data),
        }
    }

    #[test]
    fn test_run_completed_accepts_camel_case_tags() {
        let event = decode_runtime_frame(&frame(
            "run.completed",
            json!({"sessionId": "s1", "runId": "r1"}),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(event.session_id(), "s1");
        assert_eq!(event.run_id(), Some("r1"));
        assert!(event.ends_run());
    }

    #[test]
    fn test_background_job_phase() {
        let event = decode_runtime_frame(&frame(
            "background-job.finished",
            json!({"session_id": "s1", "job_id": "j9", "status": "ok", "extra": 1}),
        ))
        .unwrap()
        .unwrap();
        match event {
            RuntimeEvent::BackgroundJob {
                phase,
                job_id,
                status,
                payload,
                ..
            } => {
                assert_eq!(phase, "finished");
                assert_eq!(job_id, "j9");
                assert_eq!(status.as_deref(), Some("ok"));
                assert_eq!(payload["extra"], 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_missing_session_tag_is_parse_error() {
        let err = decode_runtime_frame(&frame("run.cancelled", json!({"reason": "user"})))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SseParseError);
    }

    #[test]
    fn test_unknown_events_are_skipped() {
        assert!(
            decode_runtime_frame(&frame("workspace.reloaded", json!({})))
                .unwrap()
                .is_none()
        );
        assert!(
            decode_runtime_frame(&frame("background-job.", json!({})))
                .unwrap()
                .is_none()
        );
    }
}
