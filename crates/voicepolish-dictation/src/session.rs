//! Per-session data shared between the start and stop procedures.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::focus::WindowHandle;
use crate::scratch::ScratchSurface;

/// One dictation session, from hotkey press to delivery.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Window that was frontmost when the session began; the delivery target.
    pub origin_window: Option<WindowHandle>,
    capture_start: Instant,
    scratch: Option<ScratchSurface>,
}

impl Session {
    pub fn new(origin_window: Option<WindowHandle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            origin_window,
            capture_start: Instant::now(),
            scratch: None,
        }
    }

    pub fn attach_scratch(&mut self, surface: ScratchSurface) {
        self.scratch = Some(surface);
    }

    /// Restart the capture clock once dictation is actually listening.
    pub fn mark_capture_started(&mut self) {
        self.capture_start = Instant::now();
    }

    /// Time spent capturing so far.
    pub fn elapsed(&self) -> Duration {
        self.capture_start.elapsed()
    }

    pub fn scratch_window(&self) -> Option<WindowHandle> {
        self.scratch.as_ref().and_then(|s| s.window)
    }

    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|s| s.path.as_path())
    }

    /// Hand the scratch surface over for teardown.
    pub fn take_scratch(&mut self) -> Option<ScratchSurface> {
        self.scratch.take()
    }
}
