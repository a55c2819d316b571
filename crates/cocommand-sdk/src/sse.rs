//! Server-Sent Events frame reader.
//!
//! [`SseDecoder`] is the pure, push-based half: feed it chunks as they arrive
//! and it hands back every frame completed by a blank line. [`frames`] wraps
//! it around an HTTP body and an [`AbortScope`].
//!
//! The decoder buffers raw bytes and only decodes a frame once its blank-line
//! terminator has been seen, so chunk boundaries may fall anywhere, including
//! inside a multi-byte character or between `\r` and `\n`.

use std::collections::VecDeque;
use std::fmt::Display;

use bytes::Bytes;
use cocommand_core::{ClientError, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;

use crate::abort::AbortScope;

pub const DEFAULT_EVENT: &str = "message";

/// Frame payload: JSON when it parses, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    Json(Value),
    Text(String),
}

impl SseData {
    fn parse(raw: String) -> Self {
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(raw),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// JSON payload, or the raw text wrapped as a JSON string.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    pub data: SseData,
}

/// Incremental frame decoder.
///
/// Each chunk is normalized once as it arrives and the terminator search
/// resumes where the previous push stopped, so a frame split over many
/// chunks costs time linear in its size.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// A `\r` ended the last chunk; whether it starts a CRLF is not known yet.
    pending_cr: bool,
    /// Offset in `buffer` where the next `\n\n` search starts.
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `chunk` and returns every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.append_normalized(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = find_frame_end(&self.buffer[from..]) {
            let end = from + offset;
            if let Some(frame) = parse_frame(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 2;
            from = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self.buffer.len().saturating_sub(1);
        frames
    }

    /// Flushes a trailing frame that never got its blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if std::mem::take(&mut self.pending_cr) {
            self.buffer.push(b'\r');
        }
        self.scanned = 0;
        let block = std::mem::take(&mut self.buffer);
        let trimmed = trim_trailing_newlines(&block);
        if trimmed.is_empty() {
            return None;
        }
        parse_frame(trimmed)
    }

    pub fn has_pending(&self) -> bool {
        self.pending_cr || !self.buffer.is_empty()
    }

    /// Appends `chunk` with `\r\n` collapsed to `\n`. A lone `\r` is kept.
    fn append_normalized(&mut self, chunk: &[u8]) {
        self.buffer.reserve(chunk.len());
        for &byte in chunk {
            if std::mem::take(&mut self.pending_cr) && byte != b'\n' {
                self.buffer.push(b'\r');
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(byte);
            }
        }
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn trim_trailing_newlines(block: &[u8]) -> &[u8] {
    let mut end = block.len();
    while end > 0 && matches!(block[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &block[..end]
}

fn parse_frame(block: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(block);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            // id and retry are valid fields the client has no use for
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event: event
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data: SseData::parse(data_lines.join("\n")),
    })
}

pub type FrameStream = BoxStream<'static, Result<SseFrame>>;

/// Frames from a streamed HTTP response.
///
/// Fails up front when the response has no body to read.
pub fn frames(response: reqwest::Response, scope: AbortScope) -> Result<FrameStream> {
    if response.content_length() == Some(0) {
        return Err(ClientError::sse("Stream response has no body"));
    }
    Ok(frames_from_bytes(response.bytes_stream(), scope))
}

struct ReaderState {
    body: BoxStream<'static, std::result::Result<Bytes, String>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    scope: AbortScope,
    body_done: bool,
    finished: bool,
}

impl ReaderState {
    /// Tears the reader down: drops the body and anything not yet yielded.
    fn close(&mut self) {
        self.finished = true;
        self.pending.clear();
        self.body = stream::empty().boxed();
    }
}

/// Frames from any byte stream. The scope is checked before every frame is
/// yielded and raced against every chunk read.
pub fn frames_from_bytes<S, E>(body: S, scope: AbortScope) -> FrameStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display,
{
    let state = ReaderState {
        body: body.map(|chunk| chunk.map_err(|e| e.to_string())).boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        scope,
        body_done: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            if let Some(cause) = state.scope.poll_cause() {
                state.close();
                let error = state.scope.error_for(cause);
                return Some((Err(error), state));
            }
            if let Some(frame) = state.pending.pop_front() {
                tracing::trace!("[SseReader] frame event={}", frame.event);
                return Some((Ok(frame), state));
            }
            if state.body_done {
                state.finished = true;
                return None;
            }

            let next = tokio::select! {
                biased;
                cause = state.scope.aborted() => Err(cause),
                chunk = state.body.next() => Ok(chunk),
            };

            match next {
                Err(cause) => {
                    state.close();
                    let error = state.scope.error_for(cause);
                    return Some((Err(error), state));
                }
                Ok(Some(Ok(chunk))) => {
                    let frames = state.decoder.push(&chunk);
                    state.pending.extend(frames);
                }
                Ok(Some(Err(message))) => {
                    state.close();
                    let error = ClientError::sse(format!("Stream read failed: {message}"));
                    return Some((Err(error), state));
                }
                Ok(None) => {
                    state.body_done = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.pending.push_back(frame);
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::RequestOptions;
    use cocommand_core::ErrorCode;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        let mut frames: Vec<SseFrame> = chunks.iter().flat_map(|c| decoder.push(c)).collect();
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn test_single_frame() {
        let frames = decode_all(&[b"event: done\ndata: {\"a\":1}\n\n"]);
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "done".into(),
                data: SseData::Json(json!({"a": 1})),
            }]
        );
    }

    #[test]
    fn test_split_at_every_byte_matches_whole() {
        let raw = "event: part.updated\r\ndata: {\"text\":\"h\u{e9}llo\"}\r\n\r\n: keepalive\n\ndata: plain\ndata: text\n\nevent: done\ndata: {}\n\n";
        let whole = decode_all(&[raw.as_bytes()]);
        let bytes: Vec<&[u8]> = raw.as_bytes().chunks(1).collect();
        let split = decode_all(&bytes);

        assert_eq!(whole, split);
        assert_eq!(whole.len(), 3);
        assert_eq!(whole[0].data, SseData::Json(json!({"text": "h\u{e9}llo"})));
        assert_eq!(whole[1].event, DEFAULT_EVENT);
        assert_eq!(whole[1].data, SseData::Text("plain\ntext".into()));
    }

    #[test]
    fn test_large_frame_in_small_chunks() {
        let text = "x".repeat(1 << 20);
        let raw = format!(
            "event: part.updated\r\ndata: {{\"text\":\"{}\"}}\r\n\r\nevent: done\r\ndata: {{}}\r\n\r\n",
            text
        );
        let mut decoder = SseDecoder::new();
        let started = std::time::Instant::now();
        let frames: Vec<SseFrame> = raw
            .as_bytes()
            .chunks(256)
            .flat_map(|chunk| decoder.push(chunk))
            .collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, SseData::Json(json!({"text": text})));
        assert_eq!(frames[1].event, "done");
        assert!(!decoder.has_pending());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_cr_split_from_lf_across_chunks() {
        let frames = decode_all(&[
            &b"data: 1\r"[..],
            &b"\n\r"[..],
            &b"\ndata: b\r"[..],
            &b"\r\n\n"[..],
        ]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, SseData::Json(json!(1)));
        assert_eq!(frames[1].data, SseData::Text("b\r".into()));
    }

    #[test]
    fn test_comments_and_unknown_fields_are_ignored() {
        let frames = decode_all(&[b": comment\nid: 7\nretry: 100\nevent: context\ndata: {}\n\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "context");
    }

    #[test]
    fn test_trailing_frame_is_flushed() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: done\ndata: {\"ok\":true}").is_empty());
        assert!(decoder.has_pending());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event, "done");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_data_without_space() {
        let frames = decode_all(&[b"data:42\n\n"]);
        assert_eq!(frames[0].data, SseData::Json(json!(42)));
    }

    #[tokio::test]
    async fn test_stream_yields_frames_across_chunks() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"event: con")),
            Ok(Bytes::from_static(b"text\ndata: {\"x\":1}\n")),
            Ok(Bytes::from_static(b"\nevent: done\ndata: {}")),
        ];
        let scope = AbortScope::new(&RequestOptions::new());
        let frames: Vec<SseFrame> = frames_from_bytes(stream::iter(chunks), scope)
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "context");
        assert_eq!(frames[1].event, "done");
    }

    #[tokio::test]
    async fn test_cancelled_scope_discards_buffered_frames() {
        let cancel = CancellationToken::new();
        let scope = AbortScope::new(&RequestOptions::new().with_cancel(cancel.clone()));
        let chunks = vec![Ok::<_, std::io::Error>(Bytes::from_static(
            b"data: 1\n\ndata: 2\n\n",
        ))];
        let mut frames = frames_from_bytes(stream::iter(chunks), scope);

        assert!(frames.next().await.unwrap().is_ok());
        cancel.cancel();
        let err = frames.next().await.unwrap().unwrap_err();
        assert_eq!(err.code, ErrorCode::Aborted);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_read_error_is_sse_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let scope = AbortScope::new(&RequestOptions::new());
        let results: Vec<_> = frames_from_bytes(stream::iter(chunks), scope).collect().await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().code, ErrorCode::SseError);
    }
}
