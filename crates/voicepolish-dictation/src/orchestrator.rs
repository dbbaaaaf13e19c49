//! Session orchestrator: hotkey toggles drive a capture session from the
//! origin window, through the scratch editor and the rewriting service, and
//! back into the origin window.
//!
//! `toggle()` is cheap and never blocks. It applies the state transition under
//! the state lock and spawns the start or stop procedure as its own task.
//! Procedures are serialized through an async session lock, so a stop that
//! arrives while setup is still running waits for setup to finish.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;

use voicepolish_core::config::TimingConfig;
use voicepolish_core::error::{PolishError, Result};
use voicepolish_rewrite::RewriteClient;

use crate::clipboard::Clipboard;
use crate::focus::FocusController;
use crate::input_sync::InputSynchronizer;
use crate::keyboard::{Chord, Keyboard};
use crate::scratch::ScratchSurfaceManager;
use crate::session::Session;
use crate::state::{DictationState, StateMachine, Trigger};

/// Characters of captured text included in debug logs.
const PREVIEW_CHARS: usize = 100;

/// Platform services the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub focus: Arc<dyn FocusController>,
    pub keyboard: Arc<dyn Keyboard>,
    pub clipboard: Arc<dyn Clipboard>,
    pub scratch: Arc<dyn ScratchSurfaceManager>,
    pub rewriter: RewriteClient,
}

/// What a hotkey press started.
#[derive(Debug)]
pub enum Toggle {
    /// Idle -> Recording; the start procedure is running.
    Started(JoinHandle<()>),
    /// Recording -> Polishing; the stop-and-deliver procedure is running.
    Stopping(JoinHandle<SessionOutcome>),
    /// Dropped because a session is being polished.
    Ignored,
}

impl Toggle {
    /// Wait for the spawned procedure. Returns the outcome for a stop.
    pub async fn join(self) -> Option<SessionOutcome> {
        match self {
            Toggle::Started(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Start procedure task failed");
                }
                None
            }
            Toggle::Stopping(handle) => match handle.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Stop procedure task failed");
                    None
                }
            },
            Toggle::Ignored => None,
        }
    }
}

/// How a stop-and-deliver procedure ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Polished text was pasted into the origin window and left on the clipboard.
    Delivered { polished: String },
    /// Capture was shorter than the minimum; torn down without a rewrite.
    TooShort,
    /// Nothing was captured; the scratch editor was left open.
    EmptyCapture,
    /// The start procedure had failed, there was nothing to stop.
    NoSession,
}

struct Inner {
    state: StateMachine,
    session: Arc<tokio::sync::Mutex<Option<Session>>>,
    dispatch: Mutex<()>,
    focus: Arc<dyn FocusController>,
    clipboard: Arc<dyn Clipboard>,
    scratch: Arc<dyn ScratchSurfaceManager>,
    rewriter: RewriteClient,
    input: InputSynchronizer,
    timing: TimingConfig,
}

/// Drives capture sessions in response to hotkey toggles.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("state", &self.inner.state.current())
            .field("rewriter", &self.inner.rewriter)
            .finish()
    }
}

impl SessionOrchestrator {
    pub fn new(collaborators: Collaborators, timing: TimingConfig, release_stuck: bool) -> Self {
        let Collaborators {
            focus,
            keyboard,
            clipboard,
            scratch,
            rewriter,
        } = collaborators;
        let input = InputSynchronizer::new(keyboard, &timing).with_release_stuck(release_stuck);

        Self {
            inner: Arc::new(Inner {
                state: StateMachine::new(),
                session: Arc::new(tokio::sync::Mutex::new(None)),
                dispatch: Mutex::new(()),
                focus,
                clipboard,
                scratch,
                rewriter,
                input,
                timing,
            }),
        }
    }

    pub fn state(&self) -> DictationState {
        self.inner.state.current()
    }

    /// Handle one hotkey press.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately.
    pub fn toggle(&self) -> Toggle {
        let _dispatch = self
            .inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match self.inner.state.begin_toggle() {
            None => {
                tracing::info!("Hotkey ignored while polishing");
                Toggle::Ignored
            }
            Some(Trigger::Start) => {
                // Claim the session lock before a following stop can queue for it.
                let claimed = Arc::clone(&self.inner.session).try_lock_owned().ok();
                let inner = Arc::clone(&self.inner);
                Toggle::Started(tokio::spawn(async move {
                    let slot = match claimed {
                        Some(slot) => slot,
                        None => Arc::clone(&inner.session).lock_owned().await,
                    };
                    inner.start(slot).await;
                }))
            }
            Some(Trigger::Stop) => {
                let inner = Arc::clone(&self.inner);
                Toggle::Stopping(tokio::spawn(async move {
                    let slot = Arc::clone(&inner.session).lock_owned().await;
                    inner.stop(slot).await
                }))
            }
        }
    }

    /// Tear down a live scratch surface before the process exits.
    ///
    /// Waits at most `kill_timeout` for a running procedure to finish.
    pub async fn shutdown(&self) {
        let lock = self.inner.session.lock();
        let mut slot = match tokio::time::timeout(self.inner.timing.kill_timeout(), lock).await {
            Ok(slot) => slot,
            Err(_) => {
                tracing::warn!("Session procedure still running at shutdown, skipping teardown");
                return;
            }
        };

        if let Some(mut session) = slot.take() {
            tracing::info!(session_id = %session.id, "Tearing down live session at shutdown");
            self.inner.teardown(&mut session).await;
        }
        if self.inner.state.current() != DictationState::Idle {
            self.inner.state.reset();
        }
    }
}

impl Inner {
    async fn start(&self, mut slot: OwnedMutexGuard<Option<Session>>) {
        let session = slot.insert(Session::new(self.focus.current()));
        tracing::info!(
            session_id = %session.id,
            origin_window = ?session.origin_window,
            "Session starting"
        );

        match self.begin_capture(session).await {
            Ok(()) => {
                tracing::info!(session_id = %session.id, "Recording, press the hotkey again to polish");
            }
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "Session start failed");
                if let Some(mut session) = slot.take() {
                    self.teardown(&mut session).await;
                }
                drop(slot);
                // A stop queued behind this start has already moved the state on.
                if let Err(e) = self
                    .state
                    .transition_from(DictationState::Recording, DictationState::Idle)
                {
                    tracing::debug!(error = %e, "Stop already queued after failed start");
                }
            }
        }
    }

    async fn begin_capture(&self, session: &mut Session) -> Result<()> {
        let removed = self.scratch.purge_restore_state();
        if removed > 0 {
            tracing::debug!(removed, "Cleared editor restore state");
        }

        let mut surface = self.scratch.open().await?;
        let window = surface.window;
        if window.is_none() || window == session.origin_window {
            // The frontmost window is not the editor; it must never be
            // typed into or killed.
            surface.window = None;
            session.attach_scratch(surface);
            return Err(PolishError::Scratch(
                "scratch editor did not take focus".into(),
            ));
        }
        session.attach_scratch(surface);

        self.input.inject(Chord::DictationToggle).await?;
        session.mark_capture_started();
        tokio::time::sleep(self.timing.dictation_start()).await;
        Ok(())
    }

    async fn stop(&self, mut slot: OwnedMutexGuard<Option<Session>>) -> SessionOutcome {
        let outcome = match slot.as_mut() {
            Some(session) => self.deliver(session).await,
            None => {
                tracing::warn!("No active session to stop");
                SessionOutcome::NoSession
            }
        };

        match &outcome {
            SessionOutcome::EmptyCapture => {
                // Leave the editor and its file for manual recovery.
                if let Some(session) = slot.take() {
                    tracing::warn!(
                        session_id = %session.id,
                        path = ?session.scratch_path(),
                        "No dictated text captured, leaving the scratch editor open"
                    );
                }
            }
            _ => {
                if let Some(mut session) = slot.take() {
                    self.teardown(&mut session).await;
                }
            }
        }
        drop(slot);

        if let Err(e) = self
            .state
            .transition_from(DictationState::Polishing, DictationState::Idle)
        {
            tracing::warn!(error = %e, "Session finished outside Polishing");
        }
        outcome
    }

    async fn deliver(&self, session: &mut Session) -> SessionOutcome {
        let elapsed = session.elapsed();
        tracing::info!(
            session_id = %session.id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stopping capture"
        );
        if elapsed < self.timing.min_capture() {
            tracing::info!(session_id = %session.id, "Capture too short, cancelling");
            return SessionOutcome::TooShort;
        }

        if let Err(e) = self.input.inject(Chord::DictationToggle).await {
            tracing::warn!(error = %e, "Failed to stop OS dictation");
        }
        tokio::time::sleep(self.timing.dictation_settle()).await;

        let raw = self.capture_text(session).await;
        tracing::debug!(
            session_id = %session.id,
            raw_len = raw.chars().count(),
            preview = %preview(&raw),
            "Captured text"
        );
        if raw.is_empty() {
            return SessionOutcome::EmptyCapture;
        }

        let polished = self.rewriter.rewrite(&raw).await;
        tracing::debug!(
            session_id = %session.id,
            polished_len = polished.chars().count(),
            preview = %preview(&polished),
            "Polished text"
        );

        self.write_clipboard(&polished);
        self.focus
            .activate(session.origin_window, self.timing.focus_settle())
            .await;
        tokio::time::sleep(self.timing.key_gap()).await;
        if let Err(e) = self.input.inject(Chord::Paste).await {
            tracing::warn!(error = %e, "Failed to paste into origin window");
        }
        tokio::time::sleep(self.timing.key_gap()).await;

        // The target app may have replaced the clipboard while pasting.
        self.write_clipboard(&polished);

        tracing::info!(
            session_id = %session.id,
            chars = polished.chars().count(),
            "Polished text delivered"
        );
        SessionOutcome::Delivered { polished }
    }

    /// Copy everything out of the scratch editor, then blank the clipboard.
    async fn capture_text(&self, session: &Session) -> String {
        self.focus
            .activate(session.scratch_window(), self.timing.focus_settle())
            .await;

        for chord in [Chord::SelectAll, Chord::Copy] {
            if let Err(e) = self.input.inject(chord).await {
                tracing::warn!(chord = %chord, error = %e, "Key injection failed");
            }
            tokio::time::sleep(self.timing.key_gap()).await;
        }

        let raw = match self.clipboard.read_text() {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read clipboard");
                String::new()
            }
        };
        if let Err(e) = self.clipboard.clear() {
            tracing::warn!(error = %e, "Failed to clear clipboard");
        }
        raw
    }

    fn write_clipboard(&self, text: &str) {
        if let Err(e) = self.clipboard.write_text(text) {
            tracing::warn!(error = %e, "Failed to write clipboard");
        }
    }

    async fn teardown(&self, session: &mut Session) {
        if let Some(surface) = session.take_scratch() {
            self.scratch.close(surface).await;
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
