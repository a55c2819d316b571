//! Error types for the Cocommand client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Machine-readable error codes.
///
/// This is a closed set: every failure the client surfaces maps to exactly one
/// of these, and the wire name (`http_error`, `sse_error`, ...) is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Non-2xx HTTP response.
    HttpError,
    /// Unexpected failure while performing a JSON request.
    ApiError,
    /// Tool invocation envelope reported `ok: false`.
    ToolError,
    /// A required payload was missing or could not be decoded.
    InvalidResponse,
    /// Stream-level failure, including server-sent `error` frames.
    SseError,
    /// A known stream event carried a malformed or missing field.
    SseParseError,
    /// Cancelled by the caller.
    Aborted,
    /// The configured deadline elapsed.
    Timeout,
    /// Backend feature that is deliberately not built.
    NotImplemented,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpError => "http_error",
            Self::ApiError => "api_error",
            Self::ToolError => "tool_error",
            Self::InvalidResponse => "invalid_response",
            Self::SseError => "sse_error",
            Self::SseParseError => "sse_parse_error",
            Self::Aborted => "aborted",
            Self::Timeout => "timeout",
            Self::NotImplemented => "not_implemented",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error type surfaced by every client operation.
///
/// `origin` names the operation that failed (e.g. `"sessions.command"`), and
/// `details` keeps the original payload around for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClientError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ClientError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            origin: None,
            details: None,
        }
    }

    /// Creates an `http_error` carrying the response status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::HttpError, message).with_status(status)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiError, message)
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ToolError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, message)
    }

    pub fn sse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SseError, message)
    }

    pub fn sse_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SseParseError, message)
    }

    pub fn aborted() -> Self {
        Self::new(ErrorCode::Aborted, "Request was aborted")
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Request timed out after {timeout_ms}ms"),
        )
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("{} is not available yet", feature.into()),
        )
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the origin only when none is recorded yet.
    pub fn or_origin(mut self, origin: &str) -> Self {
        if self.origin.is_none() {
            self.origin = Some(origin.to_string());
        }
        self
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_aborted(&self) -> bool {
        self.code == ErrorCode::Aborted
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// True for deliberate cancellation (external abort or deadline).
    pub fn is_cancellation(&self) -> bool {
        self.is_aborted() || self.is_timeout()
    }

    pub fn is_not_implemented(&self) -> bool {
        self.code == ErrorCode::NotImplemented
    }

    /// True when the failure came from the stream itself rather than the transport.
    pub fn is_stream_failure(&self) -> bool {
        matches!(self.code, ErrorCode::SseError | ErrorCode::SseParseError)
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(format!("Failed to decode JSON payload: {err}"))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::api(format!("{} (kind: {:?})", err, err.kind()))
    }
}

/// A type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_names() {
        let json = serde_json::to_string(&ErrorCode::SseParseError).unwrap();
        assert_eq!(json, "\"sse_parse_error\"");
        assert_eq!(ErrorCode::NotImplemented.to_string(), "not_implemented");
    }

    #[test]
    fn test_display_uses_message() {
        let err = ClientError::http(502, "Bad gateway").with_origin("sessions.command");
        assert_eq!(err.to_string(), "Bad gateway");
        assert_eq!(err.status, Some(502));
        assert_eq!(err.origin.as_deref(), Some("sessions.command"));
    }

    #[test]
    fn test_cancellation_predicates() {
        assert!(ClientError::aborted().is_cancellation());
        assert!(ClientError::timeout(10).is_cancellation());
        assert!(!ClientError::sse("boom").is_cancellation());
        assert!(ClientError::sse_parse("bad").is_stream_failure());
    }

    #[test]
    fn test_or_origin_keeps_existing() {
        let err = ClientError::api("x").with_origin("first").or_origin("second");
        assert_eq!(err.origin.as_deref(), Some("first"));
        let err = ClientError::api("x").or_origin("second");
        assert_eq!(err.origin.as_deref(), Some("second"));
    }
}
