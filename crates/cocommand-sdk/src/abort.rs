//! Unified cancellation for one request.
//!
//! An external `CancellationToken` and a per-call deadline are folded into a
//! single scope. Whichever fires first is recorded, so afterwards a caller can
//! tell a timeout from an external abort.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use cocommand_core::{ClientError, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCause {
    None,
    Timeout,
    External,
}

/// Per-call cancellation inputs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout_ms: Option<u64>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AbortScope {
    token: CancellationToken,
    deadline: Option<Instant>,
    timeout_ms: Option<u64>,
    cause: Arc<OnceLock<AbortCause>>,
}

impl AbortScope {
    pub fn new(options: &RequestOptions) -> Self {
        let token = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let deadline = options
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        Self {
            token,
            deadline,
            timeout_ms: options.timeout_ms,
            cause: Arc::new(OnceLock::new()),
        }
    }

    /// The unified token. Cancelled by either source.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cause(&self) -> AbortCause {
        self.cause.get().copied().unwrap_or(AbortCause::None)
    }

    /// Non-blocking check, used at every loop iteration of the stream readers.
    pub fn poll_cause(&self) -> Option<AbortCause> {
        if let Some(cause) = self.cause.get() {
            return Some(*cause);
        }
        if self.token.is_cancelled() {
            return Some(self.record(AbortCause::External));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let cause = self.record(AbortCause::Timeout);
            self.token.cancel();
            return Some(cause);
        }
        None
    }

    /// Resolves once the scope is aborted, with the cause.
    pub async fn aborted(&self) -> AbortCause {
        if let Some(cause) = self.poll_cause() {
            return cause;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => self.record(AbortCause::External),
                    _ = tokio::time::sleep_until(deadline) => {
                        let cause = self.record(AbortCause::Timeout);
                        self.token.cancel();
                        cause
                    }
                }
            }
            None => {
                self.token.cancelled().await;
                self.record(AbortCause::External)
            }
        }
    }

    /// Typed error for an abort cause.
    pub fn error_for(&self, cause: AbortCause) -> ClientError {
        match cause {
            AbortCause::Timeout => ClientError::timeout(self.timeout_ms.unwrap_or_default()),
            AbortCause::External | AbortCause::None => ClientError::aborted(),
        }
    }

    /// Runs `future` unless the scope aborts first.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if let Some(cause) = self.poll_cause() {
            return Err(self.error_for(cause));
        }
        tokio::select! {
            biased;
            cause = self.aborted() => Err(self.error_for(cause)),
            value = future => Ok(value),
        }
    }

    fn record(&self, cause: AbortCause) -> AbortCause {
        let _ = self.cause.set(cause);
        self.cause.get().copied().unwrap_or(cause)
    }
}
