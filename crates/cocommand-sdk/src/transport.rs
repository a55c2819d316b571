//! HTTP layer shared by every endpoint group.
//!
//! Two request shapes: a JSON exchange ([`Transport::request_json`]) and a
//! request that opens a streamed response for SSE consumption
//! ([`Transport::open_stream`]). Both run inside an [`AbortScope`] and classify
//! every failure into a `ClientError`.

use cocommand_core::{ClientError, Result};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::abort::{AbortCause, AbortScope, RequestOptions};

const EVENT_STREAM: &str = "text/event-stream";

/// How a successful JSON response is unwrapped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapOptions {
    /// Treat an empty or `null` body as success (endpoints with no payload).
    pub allow_empty: bool,
}

impl UnwrapOptions {
    pub fn allow_empty() -> Self {
        Self { allow_empty: true }
    }
}

/// A request before it is sent: method, path and optional query/body.
#[derive(Debug, Clone)]
pub struct RequestSpec<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: Vec<(&'a str, String)>,
    pub body: Option<Value>,
    /// Names the operation in errors (e.g. `"sessions.command"`).
    pub origin: &'a str,
}

impl<'a> RequestSpec<'a> {
    pub fn get(path: &'a str, origin: &'a str) -> Self {
        Self {
            method: Method::GET,
            path,
            query: Vec::new(),
            body: None,
            origin,
        }
    }

    pub fn post(path: &'a str, origin: &'a str) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(path, origin)
        }
    }

    pub fn query(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn query_opt(self, key: &'a str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            ClientError::api(format!("Failed to encode request body: {e}")).with_origin(self.origin)
        })?;
        self.body = Some(value);
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
    base_url: String,
    default_timeout_ms: Option<u64>,
}

impl Transport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_timeout_ms: None,
        }
    }

    /// Deadline applied when a call does not set its own.
    pub fn with_default_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Builds the unified abort scope for one call.
    pub fn scope(&self, options: &RequestOptions) -> AbortScope {
        let mut options = options.clone();
        if options.timeout_ms.is_none() {
            options.timeout_ms = self.default_timeout_ms;
        }
        AbortScope::new(&options)
    }

    fn build(&self, spec: &RequestSpec<'_>) -> reqwest::RequestBuilder {
        let mut request = self.http.request(spec.method.clone(), self.url(spec.path));
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }
        request
    }

    /// Performs a JSON exchange and returns the raw payload.
    ///
    /// `Ok(None)` only when `unwrap.allow_empty` is set and the body was empty
    /// or `null`.
    pub async fn request_value(
        &self,
        spec: RequestSpec<'_>,
        options: &RequestOptions,
        unwrap: UnwrapOptions,
    ) -> Result<Option<Value>> {
        let scope = self.scope(options);
        let origin = spec.origin;
        tracing::debug!("[Transport] {} {} ({})", spec.method, spec.path, origin);

        let exchange = async {
            let response = self.build(&spec).send().await.map_err(|err| {
                ClientError::api(format!("Request failed: {err}")).with_origin(origin)
            })?;
            let status = response.status();
            let body = response.text().await.map_err(|err| {
                ClientError::api(format!("Failed to read response body: {err}"))
                    .with_status(status.as_u16())
                    .with_origin(origin)
            })?;
            Ok::<_, ClientError>((status, body))
        };

        let (status, body) = scope.run(exchange).await.map_err(|e| e.or_origin(origin))??;

        if !status.is_success() {
            let error = http_error(status, parse_body(&body), origin);
            tracing::warn!("[Transport] {} failed: {}", origin, error);
            return Err(error);
        }

        let payload = parse_body(&body);
        match payload {
            None | Some(Value::Null) if unwrap.allow_empty => Ok(None),
            None | Some(Value::Null) => Err(ClientError::invalid_response(format!(
                "{origin} returned an empty response"
            ))
            .with_status(status.as_u16())
            .with_origin(origin)),
            Some(value) => Ok(Some(value)),
        }
    }

    /// Performs a JSON exchange and decodes the payload into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        spec: RequestSpec<'_>,
        options: &RequestOptions,
    ) -> Result<T> {
        let origin = spec.origin;
        let value = self
            .request_value(spec, options, UnwrapOptions::default())
            .await?
            .unwrap_or(Value::Null);
        decode_payload(value, origin)
    }

    /// Performs a request whose success carries no payload.
    pub async fn request_empty(
        &self,
        spec: RequestSpec<'_>,
        options: &RequestOptions,
    ) -> Result<()> {
        self.request_value(spec, options, UnwrapOptions::allow_empty())
            .await
            .map(|_| ())
    }

    /// Opens a streamed response. The caller keeps `scope` alive for reading.
    ///
    /// A non-ok response is drained (JSON first, then text) before the error is
    /// built, so error bodies are never dropped.
    pub async fn open_stream(&self, spec: RequestSpec<'_>, scope: &AbortScope) -> Result<Response> {
        let origin = spec.origin;
        tracing::debug!("[Transport] open stream {} {} ({})", spec.method, spec.path, origin);

        let request = self
            .build(&spec)
            .header(ACCEPT, HeaderValue::from_static(EVENT_STREAM));

        let response = match scope.run(request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(classify_stream_failure(scope, &err.to_string(), origin)),
            Err(abort) => return Err(abort.with_origin(origin)),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match scope.run(response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => format!("<unreadable body: {err}>"),
            Err(abort) => return Err(abort.with_origin(origin)),
        };
        let error = http_error(status, parse_body(&body), origin);
        tracing::warn!("[Transport] {} stream rejected: {}", origin, error);
        Err(error)
    }
}

/// JSON when the body parses, the raw text otherwise, `None` when empty.
fn parse_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

fn decode_payload<T: DeserializeOwned>(value: Value, origin: &str) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|err| {
        ClientError::invalid_response(format!("{origin} returned an unexpected payload: {err}"))
            .with_origin(origin)
            .with_details(value)
    })
}

/// Pulls `(code, message)` out of an error payload.
///
/// Accepts `{"error": {"code", "message"}}`, `{"code", "message"}`,
/// `{"error": "message"}` and a bare string.
pub fn extract_error(payload: &Value) -> Option<(Option<String>, String)> {
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);
    match payload {
        Value::String(message) if !message.trim().is_empty() => Some((None, message.clone())),
        Value::Object(map) => {
            if let Some(Value::Object(inner)) = map.get("error") {
                if let Some(message) = text(inner.get("message")) {
                    return Some((text(inner.get("code")), message));
                }
            }
            if let Some(message) = text(map.get("error")) {
                return Some((text(map.get("code")), message));
            }
            text(map.get("message")).map(|message| (text(map.get("code")), message))
        }
        _ => None,
    }
}

fn http_error(status: StatusCode, payload: Option<Value>, origin: &str) -> ClientError {
    let extracted = payload.as_ref().and_then(extract_error);
    let (code, message) = match extracted {
        Some((code, message)) => (code, message),
        None => (None, format!("Request failed with status {}", status.as_u16())),
    };

    let mut error = ClientError::http(status.as_u16(), message).with_origin(origin);
    let mut details = json!({ "status": status.as_u16() });
    if let Some(code) = code {
        details["code"] = Value::String(code);
    }
    if let Some(body) = payload {
        details["body"] = body;
    }
    error.details = Some(details);
    error
}

/// Reclassifies a failure raised while opening a stream.
fn classify_stream_failure(scope: &AbortScope, cause: &str, origin: &str) -> ClientError {
    let error = match scope.poll_cause() {
        Some(AbortCause::Timeout) => scope.error_for(AbortCause::Timeout),
        Some(AbortCause::External) => scope.error_for(AbortCause::External),
        _ => ClientError::sse(format!("Failed to open stream: {cause}"))
            .with_details(json!({ "cause": cause })),
    };
    error.with_origin(origin)
}
