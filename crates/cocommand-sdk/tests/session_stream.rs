//! Contract tests for the session command stream against a mock backend.

use std::time::Duration;

use cocommand_core::ErrorCode;
use cocommand_core::session::{MessagePart, SessionCommandEvent, SessionCommandInputPart};
use cocommand_sdk::{CocommandClient, RequestOptions};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(frames: &[(&str, Value)]) -> String {
    frames
        .iter()
        .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
        .collect()
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn context() -> Value {
    json!({"workspace_id": "w1", "session_id": "s1", "started_at": "2024-05-01T10:00:00Z", "ended_at": null})
}

fn assistant(parts: Value) -> Value {
    json!({
        "info": {"id": "m2", "session_id": "s1", "role": "assistant", "created_at": "2024-05-01T10:00:01Z"},
        "parts": parts
    })
}

fn input() -> Vec<SessionCommandInputPart> {
    vec![SessionCommandInputPart::text("summarize my notes")]
}

#[tokio::test]
async fn test_command_resolves_with_done_payload() {
    let server = MockServer::start().await;
    let text = json!({"type": "text", "id": "p1", "text": "Here you go"});
    let body = sse_body(&[
        ("message.started", json!({"assistant_message": assistant(json!([]))})),
        ("part.updated", json!({"message_id": "m2", "part_id": "p1", "part": text})),
        ("done", json!({"context": context(), "messages": [assistant(json!([text]))]})),
    ]);
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .and(body_json(json!({"parts": [{"type": "text", "text": "summarize my notes"}]})))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let result = client
        .sessions()
        .command(&input(), &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(result.context.session_id, "s1");
    assert_eq!(result.messages.len(), 1);
    assert_eq!(
        result.reply_parts(),
        vec![MessagePart::text("p1", "Here you go")]
    );
}

#[tokio::test]
async fn test_command_stream_yields_events_in_order() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        ("message.started", json!({"assistant_message": assistant(json!([]))})),
        ("context", json!({"context": context()})),
        ("heartbeat", json!({})),
        ("done", json!({"context": context(), "messages": []})),
        ("context", json!({"context": context()})),
    ]);
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let events: Vec<SessionCommandEvent> = client
        .sessions()
        .command_stream(&input(), &RequestOptions::new())
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    let names: Vec<&str> = events.iter().map(SessionCommandEvent::name).collect();
    // Unknown events are skipped and nothing is read past `done`
    assert_eq!(names, vec!["message.started", "context", "done"]);
}

#[tokio::test]
async fn test_command_without_done_fails() {
    let server = MockServer::start().await;
    let body = sse_body(&[("context", json!({"context": context()}))]);
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let err = client
        .sessions()
        .command(&input(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidResponse);
    assert_eq!(err.origin.as_deref(), Some("sessions.command"));
}

#[tokio::test]
async fn test_error_frame_fails_with_sse_error() {
    let server = MockServer::start().await;
    let body = sse_body(&[(
        "error",
        json!({"error": {"code": "bad_request", "message": "stream failed"}}),
    )]);
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let err = client
        .sessions()
        .command(&input(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::SseError);
    assert!(err.message.contains("stream failed"));
}

#[tokio::test]
async fn test_malformed_part_update_stops_the_stream() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        ("part.updated", json!({"message_id": "m2", "part_id": "p1"})),
        ("done", json!({"context": context(), "messages": []})),
    ]);
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let results: Vec<_> = client
        .sessions()
        .command_stream(&input(), &RequestOptions::new())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].as_ref().unwrap_err().code,
        ErrorCode::SseParseError
    );
}

#[tokio::test]
async fn test_rejected_stream_keeps_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"error": {"code": "busy", "message": "Session is busy"}})),
        )
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let err = client
        .sessions()
        .command(&input(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::HttpError);
    assert_eq!(err.status, Some(409));
    assert_eq!(err.message, "Session is busy");
    assert_eq!(err.details.unwrap()["code"], "busy");
}

#[tokio::test]
async fn test_rejected_stream_with_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let err = client
        .sessions()
        .command(&input(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::HttpError);
    assert_eq!(err.message, "upstream exploded");
}

#[tokio::test]
async fn test_cancel_before_send_is_aborted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(sse_response(String::new()))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = CocommandClient::new(server.uri());
    let err = client
        .sessions()
        .command(
            &input(),
            &RequestOptions::new().with_cancel(cancel).with_timeout_ms(10),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Aborted);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/command"))
        .respond_with(sse_response(String::new()).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let err = client
        .sessions()
        .command(&input(), &RequestOptions::new().with_timeout_ms(50))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Timeout);
}

#[tokio::test]
async fn test_context_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/context"))
        .and(query_param("workspace_id", "w1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(context()))
        .mount(&server)
        .await;

    let client = CocommandClient::new(server.uri());
    let context = client
        .sessions()
        .context(Some("w1"), None, &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(context.workspace_id, "w1");
    assert!(!context.is_ended());
}
