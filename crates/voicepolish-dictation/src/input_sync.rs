//! Waits for the user's physical modifier keys before synthetic injection.
//!
//! The session hotkey itself is a modifier chord, so the user's Ctrl/Alt are
//! often still down when a procedure starts. Injecting Ctrl+A while Alt is
//! held would produce Ctrl+Alt+A in the target window.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use voicepolish_core::config::TimingConfig;
use voicepolish_core::error::Result;

use crate::keyboard::{Chord, Keyboard};

/// Polls modifier state until released or a timeout elapses.
#[derive(Clone)]
pub struct InputSynchronizer {
    keyboard: Arc<dyn Keyboard>,
    timeout: Duration,
    poll: Duration,
    release_stuck: bool,
}

impl std::fmt::Debug for InputSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSynchronizer")
            .field("timeout", &self.timeout)
            .field("poll", &self.poll)
            .field("release_stuck", &self.release_stuck)
            .finish()
    }
}

impl InputSynchronizer {
    pub fn new(keyboard: Arc<dyn Keyboard>, timing: &TimingConfig) -> Self {
        Self {
            keyboard,
            timeout: timing.modifier_release_timeout(),
            poll: timing.modifier_poll(),
            release_stuck: false,
        }
    }

    /// Inject modifier key-ups when the wait times out.
    pub fn with_release_stuck(mut self, release_stuck: bool) -> Self {
        self.release_stuck = release_stuck;
        self
    }

    /// Return as soon as no modifier is held, or after the timeout.
    ///
    /// Returns `false` on timeout. A timeout is only a warning: the caller
    /// proceeds, accepting that the next injected chord may combine with the
    /// held keys.
    pub async fn await_release(&self) -> bool {
        let deadline = Instant::now() + self.timeout;
        loop {
            if !self.keyboard.modifiers_held() {
                return true;
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.poll).await;
        }

        tracing::warn!(
            timeout_ms = self.timeout.as_millis() as u64,
            "Modifier keys still held, continuing anyway"
        );
        if self.release_stuck {
            match self.keyboard.release_modifiers() {
                Ok(()) => tracing::info!("Injected modifier key-ups"),
                Err(e) => tracing::warn!(error = %e, "Failed to release modifier keys"),
            }
        }
        false
    }

    /// Wait for modifier release, then inject `chord`.
    pub async fn inject(&self, chord: Chord) -> Result<()> {
        self.await_release().await;
        self.keyboard.send_chord(chord)
    }
}
