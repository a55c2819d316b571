//! Command submission controller.
//!
//! One controller backs one palette surface. It owns the draft, the reply
//! being assembled, the turn history and the session context, and publishes
//! a [`ControllerSnapshot`] after every change.
//!
//! State lives behind a mutex that is never held across an await, so clones
//! of the controller can be driven from several tasks (e.g. a key handler
//! cancelling while a submit is streaming).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use cocommand_core::composer;
use cocommand_core::config::ClientConfig;
use cocommand_core::draft::DraftInput;
use cocommand_core::history::InputHistory;
use cocommand_core::session::{MessagePart, SessionCommandInputPart, SessionContext};
use cocommand_core::turn::{CommandTurn, TurnHistory};
use cocommand_core::{ClientError, ErrorCode, Result};
use cocommand_sdk::{CocommandClient, RequestOptions, SessionEventStream};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::assembly::{AssemblyUpdate, ResponseAssembler};

const CANCELLED_MESSAGE: &str = "Command cancelled";

/// Opens command streams. Implemented by the HTTP client; tests substitute
/// scripted backends.
#[async_trait]
pub trait CommandBackend: Send + Sync {
    async fn open_command(
        &self,
        parts: &[SessionCommandInputPart],
        options: &RequestOptions,
    ) -> Result<SessionEventStream>;
}

#[async_trait]
impl CommandBackend for CocommandClient {
    async fn open_command(
        &self,
        parts: &[SessionCommandInputPart],
        options: &RequestOptions,
    ) -> Result<SessionEventStream> {
        self.sessions().command_stream(parts, options).await
    }
}

/// An extension view the host should show in its own window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionWindow {
    pub extension_id: String,
    pub title: String,
    pub url: Option<String>,
}

/// The desktop window host. Calls are fire-and-forget; a host that can fail
/// reports it through its own logging.
#[async_trait]
pub trait WindowHost: Send + Sync {
    async fn hide_window(&self);
    async fn open_settings_window(&self);
    async fn open_extension_window(&self, window: &ExtensionWindow);
    async fn close_extension_window(&self, extension_id: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Submitting,
    Error,
}

/// User-facing error shown on the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedError {
    pub code: ErrorCode,
    pub message: String,
}

/// Everything a surface needs to render.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub state: ControllerState,
    pub draft: DraftInput,
    pub parts: Vec<MessagePart>,
    pub error: Option<DisplayedError>,
    pub context: Option<SessionContext>,
    pub turns: Vec<CommandTurn>,
    pub suggestions_open: bool,
    pub navigating_history: bool,
}

impl ControllerSnapshot {
    pub fn is_submitting(&self) -> bool {
        self.state == ControllerState::Submitting
    }

    /// Whether anything besides the draft is on screen.
    pub fn has_output(&self) -> bool {
        !self.parts.is_empty() || self.error.is_some()
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Completed { turn_id: String },
    /// Nothing to send.
    Ignored,
    /// Another submission is in flight.
    Rejected,
    Cancelled,
    Failed(ClientError),
    SettingsOpened,
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::SettingsOpened)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissOutcome {
    /// The in-flight command was cancelled.
    Cancelled,
    /// Reply or error cleared; window stays.
    Cleared,
    Hidden,
}

/// Disposes the surface when dropped: any open stream is aborted and the
/// controller stops publishing.
pub struct SurfaceGuard {
    _guard: DropGuard,
}

impl SurfaceGuard {
    pub fn dispose(self) {}
}

struct ActiveSubmission {
    turn_id: String,
    cancel: CancellationToken,
}

struct Submission {
    turn_id: String,
    input: Vec<SessionCommandInputPart>,
    cancel: CancellationToken,
    /// Sent from the draft rather than override text; only then does success clear it.
    from_draft: bool,
}

enum SubmitPlan {
    Rejected,
    Ignored,
    Settings,
    Start(Submission),
}

struct StreamFailure {
    error: ClientError,
    parts: Vec<MessagePart>,
}

struct Inner {
    state: ControllerState,
    draft: DraftInput,
    history: InputHistory,
    turns: TurnHistory,
    parts: Vec<MessagePart>,
    error: Option<DisplayedError>,
    context: Option<SessionContext>,
    suggestions_open: bool,
    active: Option<ActiveSubmission>,
}

impl Inner {
    fn new(history_limit: usize) -> Self {
        Self {
            state: ControllerState::Idle,
            draft: DraftInput::new(),
            history: InputHistory::new(history_limit),
            turns: TurnHistory::new(history_limit),
            parts: Vec::new(),
            error: None,
            context: None,
            suggestions_open: false,
            active: None,
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            draft: self.draft.clone(),
            parts: self.parts.clone(),
            error: self.error.clone(),
            context: self.context.clone(),
            turns: self.turns.to_vec(),
            suggestions_open: self.suggestions_open,
            navigating_history: self.history.is_navigating(),
        }
    }

    fn is_active(&self, turn_id: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.turn_id == turn_id)
    }

    fn plan_submit(
        &mut self,
        override_text: Option<&str>,
        settings_command: &str,
        surface: &CancellationToken,
    ) -> SubmitPlan {
        if self.active.is_some() {
            return SubmitPlan::Rejected;
        }
        let draft = match override_text {
            Some(text) => DraftInput::from_text(text),
            None => self.draft.clone(),
        };
        if draft.is_blank() {
            return SubmitPlan::Ignored;
        }
        if !draft.has_attachments() && draft.render().trim() == settings_command {
            return SubmitPlan::Settings;
        }

        let input = draft.to_input_parts();
        let turn = CommandTurn::start(input.clone());
        let submission = Submission {
            turn_id: turn.id.clone(),
            input: input.clone(),
            cancel: surface.child_token(),
            from_draft: override_text.is_none(),
        };

        self.state = ControllerState::Submitting;
        self.parts.clear();
        self.error = None;
        self.turns.push(turn);
        self.history.push(input);
        self.active = Some(ActiveSubmission {
            turn_id: submission.turn_id.clone(),
            cancel: submission.cancel.clone(),
        });
        SubmitPlan::Start(submission)
    }

    fn clear_surface(&mut self) {
        self.state = ControllerState::Idle;
        self.draft = DraftInput::new();
        self.parts.clear();
        self.error = None;
        self.suggestions_open = false;
        self.history.reset();
    }
}

struct Shared<B, H> {
    backend: B,
    host: H,
    settings_command: String,
    surface: CancellationToken,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<ControllerSnapshot>,
}

pub struct CommandController<B, H> {
    shared: Arc<Shared<B, H>>,
}

impl<B, H> Clone for CommandController<B, H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: CommandBackend, H: WindowHost> CommandController<B, H> {
    pub fn new(backend: B, host: H, config: &ClientConfig) -> Self {
        let inner = Inner::new(config.history_limit);
        let (snapshot, _) = watch::channel(inner.snapshot());
        Self {
            shared: Arc::new(Shared {
                backend,
                host,
                settings_command: config.settings_command.clone(),
                surface: CancellationToken::new(),
                inner: Mutex::new(inner),
                snapshot,
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    pub fn host(&self) -> &H {
        &self.shared.host
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.lock().snapshot()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.surface.is_cancelled()
    }

    /// Tears the surface down now.
    pub fn dispose(&self) {
        if !self.is_disposed() {
            tracing::info!("[CommandController] Surface disposed");
            self.shared.surface.cancel();
        }
    }

    /// Ties the surface's lifetime to the returned guard.
    pub fn surface_guard(&self) -> SurfaceGuard {
        SurfaceGuard {
            _guard: self.shared.surface.clone().drop_guard(),
        }
    }

    /// Replaces the text being typed. Refused while a command is in flight.
    pub fn set_input(&self, text: &str) -> bool {
        self.update(|inner| {
            if inner.active.is_some() {
                return false;
            }
            inner.draft.set_active_text(text);
            let active_text = inner.draft.active_text();
            inner.suggestions_open = composer::active_trigger(active_text, active_text.len()).is_some();
            inner.history.reset();
            true
        })
    }

    pub fn set_draft_parts(&self, parts: Vec<SessionCommandInputPart>) -> bool {
        self.update(|inner| {
            if inner.active.is_some() {
                return false;
            }
            inner.draft.commit(parts);
            inner.history.reset();
            true
        })
    }

    pub fn attach(&self, part: SessionCommandInputPart) -> bool {
        self.update(|inner| {
            if inner.active.is_some() {
                return false;
            }
            inner.draft.attach(part);
            true
        })
    }

    /// For surfaces that track their own suggestion panel.
    pub fn set_suggestions_open(&self, open: bool) {
        self.update(|inner| inner.suggestions_open = open);
    }

    pub fn history_up(&self) -> bool {
        self.update(|inner| {
            if inner.active.is_some() || inner.suggestions_open {
                return false;
            }
            match inner.history.up(&inner.draft) {
                Some(draft) => {
                    inner.draft = draft;
                    true
                }
                None => false,
            }
        })
    }

    pub fn history_down(&self) -> bool {
        self.update(|inner| {
            if inner.active.is_some() || inner.suggestions_open {
                return false;
            }
            match inner.history.down() {
                Some(draft) => {
                    inner.draft = draft;
                    true
                }
                None => false,
            }
        })
    }

    /// Submits the draft, or `override_text` in its place.
    ///
    /// Resolves once the command reaches a terminal state. Progress is
    /// published through [`subscribe`](Self::subscribe) as events arrive.
    pub async fn submit(&self, override_text: Option<&str>) -> SubmitOutcome {
        if self.is_disposed() {
            return SubmitOutcome::Cancelled;
        }
        let plan = self.update(|inner| {
            inner.plan_submit(override_text, &self.shared.settings_command, &self.shared.surface)
        });

        let submission = match plan {
            SubmitPlan::Rejected => {
                tracing::debug!("[CommandController] Submit rejected: command in flight");
                return SubmitOutcome::Rejected;
            }
            SubmitPlan::Ignored => return SubmitOutcome::Ignored,
            SubmitPlan::Settings => {
                tracing::info!("[CommandController] Opening settings");
                self.shared.host.open_settings_window().await;
                self.reset();
                return SubmitOutcome::SettingsOpened;
            }
            SubmitPlan::Start(submission) => submission,
        };

        tracing::info!(
            "[CommandController] Submitting turn {} ({} parts)",
            submission.turn_id,
            submission.input.len()
        );
        let result = self.stream_turn(&submission).await;
        self.finish(submission, result)
    }

    /// Cancels the in-flight command, if any.
    pub fn cancel(&self) -> bool {
        let lock = self.lock();
        match &lock.active {
            Some(active) => {
                tracing::info!("[CommandController] Cancelling turn {}", active.turn_id);
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Escape: cancel what is running, else clear what is shown, else hide.
    ///
    /// Clearing drops the reply and the error but leaves the draft in place, so
    /// the text of a failed command can be edited and sent again. An empty
    /// draft comes from a successful submit or [`reset`](Self::reset).
    pub async fn dismiss(&self) -> DismissOutcome {
        let outcome = self.update(|inner| {
            if let Some(active) = &inner.active {
                active.cancel.cancel();
                return DismissOutcome::Cancelled;
            }
            if !inner.parts.is_empty() || inner.error.is_some() {
                inner.parts.clear();
                inner.error = None;
                inner.state = ControllerState::Idle;
                return DismissOutcome::Cleared;
            }
            DismissOutcome::Hidden
        });
        if outcome == DismissOutcome::Hidden {
            self.shared.host.hide_window().await;
        }
        outcome
    }

    /// Back to an empty surface. An in-flight command is cancelled and its
    /// turn marked failed; completed turns and input history are kept.
    pub fn reset(&self) {
        self.update(|inner| {
            if let Some(active) = inner.active.take() {
                active.cancel.cancel();
                let parts = std::mem::take(&mut inner.parts);
                if let Some(turn) = inner.turns.get_mut(&active.turn_id) {
                    turn.fail(parts, CANCELLED_MESSAGE);
                }
            }
            inner.clear_surface();
        });
    }

    pub async fn open_extension(&self, window: &ExtensionWindow) {
        tracing::info!("[CommandController] Opening extension window {}", window.extension_id);
        self.shared.host.open_extension_window(window).await;
    }

    pub async fn close_extension(&self, extension_id: &str) {
        self.shared.host.close_extension_window(extension_id).await;
    }

    async fn stream_turn(
        &self,
        submission: &Submission,
    ) -> std::result::Result<Vec<MessagePart>, StreamFailure> {
        let options = RequestOptions::new().with_cancel(submission.cancel.clone());
        let mut assembler = ResponseAssembler::with_context(self.lock().context.clone());

        let opened = tokio::select! {
            biased;
            _ = submission.cancel.cancelled() => Err(ClientError::aborted()),
            opened = self.shared.backend.open_command(&submission.input, &options) => opened,
        };
        let mut events = match opened {
            Ok(events) => events,
            Err(error) => {
                return Err(StreamFailure {
                    error,
                    parts: Vec::new(),
                });
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = submission.cancel.cancelled() => Some(Err(ClientError::aborted())),
                next = events.next() => next,
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(error)) => {
                    return Err(StreamFailure {
                        error,
                        parts: assembler.into_parts(),
                    });
                }
                None => break,
            };

            tracing::debug!(
                "[CommandController] {} for turn {}",
                event.name(),
                submission.turn_id
            );
            let update = assembler.apply(event);
            if !matches!(update, AssemblyUpdate::Ignored | AssemblyUpdate::Started) {
                self.publish_progress(&submission.turn_id, &assembler);
            }
            if assembler.is_done() {
                return Ok(assembler.into_parts());
            }
        }

        Err(StreamFailure {
            error: ClientError::invalid_response("Session command stream ended without a done event"),
            parts: assembler.into_parts(),
        })
    }

    fn publish_progress(&self, turn_id: &str, assembler: &ResponseAssembler) {
        self.update(|inner| {
            if !inner.is_active(turn_id) {
                return;
            }
            inner.parts = assembler.parts().to_vec();
            if let Some(context) = assembler.context() {
                inner.context = Some(context.clone());
            }
            if let Some(turn) = inner.turns.get_mut(turn_id) {
                turn.parts = assembler.parts().to_vec();
            }
        });
    }

    fn finish(
        &self,
        submission: Submission,
        result: std::result::Result<Vec<MessagePart>, StreamFailure>,
    ) -> SubmitOutcome {
        let Submission {
            turn_id,
            from_draft,
            ..
        } = submission;
        let torn_down = self.is_disposed();
        self.update(|inner| {
            if !inner.is_active(&turn_id) {
                // reset() already retired this turn
                return SubmitOutcome::Cancelled;
            }
            inner.active = None;

            match result {
                Ok(parts) => {
                    tracing::info!(
                        "[CommandController] Turn {} complete ({} parts)",
                        turn_id,
                        parts.len()
                    );
                    if let Some(turn) = inner.turns.get_mut(&turn_id) {
                        turn.complete(parts.clone());
                    }
                    inner.parts = parts;
                    inner.state = ControllerState::Idle;
                    if from_draft {
                        inner.draft = DraftInput::new();
                        inner.suggestions_open = false;
                    }
                    SubmitOutcome::Completed { turn_id }
                }
                Err(StreamFailure { error, .. }) if torn_down && error.is_aborted() => {
                    tracing::debug!("[CommandController] Turn {} dropped on teardown", turn_id);
                    inner.turns.remove(&turn_id);
                    inner.parts.clear();
                    inner.state = ControllerState::Idle;
                    SubmitOutcome::Cancelled
                }
                Err(StreamFailure { error, parts }) => {
                    let message = user_message(&error);
                    tracing::warn!(
                        "[CommandController] Turn {} failed ({}): {}",
                        turn_id,
                        error.code,
                        error.message
                    );
                    if let Some(turn) = inner.turns.get_mut(&turn_id) {
                        turn.fail(parts.clone(), message.clone());
                    }
                    inner.parts = parts;
                    inner.state = ControllerState::Error;
                    inner.error = Some(DisplayedError {
                        code: error.code,
                        message,
                    });
                    if error.is_aborted() {
                        SubmitOutcome::Cancelled
                    } else {
                        SubmitOutcome::Failed(error)
                    }
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates state and publishes the result, unless the surface is gone.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner);
        if !self.is_disposed() {
            self.shared.snapshot.send_replace(inner.snapshot());
        }
        result
    }
}

/// Message shown on the surface for a failed command.
pub fn user_message(error: &ClientError) -> String {
    match error.code {
        ErrorCode::Aborted => CANCELLED_MESSAGE.to_string(),
        ErrorCode::Timeout => format!("Command timed out: {}", error.message),
        ErrorCode::NotImplemented => format!("Feature unavailable: {}", error.message),
        _ if error.message.trim().is_empty() => "Command failed".to_string(),
        _ => error.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        assert_eq!(user_message(&ClientError::aborted()), "Command cancelled");
        assert_eq!(
            user_message(&ClientError::timeout(50)),
            "Command timed out: Request timed out after 50ms"
        );
        assert_eq!(
            user_message(&ClientError::not_implemented("Note search")),
            "Feature unavailable: Note search is not available yet"
        );
        assert_eq!(user_message(&ClientError::api("")), "Command failed");
        assert_eq!(user_message(&ClientError::http(409, "busy")), "busy");
    }

    #[test]
    fn test_submit_outcome_success() {
        assert!(SubmitOutcome::Completed { turn_id: "t".into() }.is_success());
        assert!(SubmitOutcome::SettingsOpened.is_success());
        assert!(!SubmitOutcome::Rejected.is_success());
        assert!(!SubmitOutcome::Failed(ClientError::api("x")).is_success());
    }
}
