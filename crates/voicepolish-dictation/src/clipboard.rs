//! System clipboard access via `arboard`.
//!
//! A fresh `arboard::Clipboard` is opened for every call: the handle is not
//! `Sync` on every platform and the orchestrator touches the clipboard only a
//! handful of times per session.

use voicepolish_core::error::{PolishError, Result};

/// Single process-wide text slot.
pub trait Clipboard: Send + Sync {
    /// Current text content. An empty or non-text clipboard reads as `""`.
    fn read_text(&self) -> Result<String>;

    fn write_text(&self, text: &str) -> Result<()>;

    /// Blank the clipboard.
    fn clear(&self) -> Result<()> {
        self.write_text("")
    }
}

/// The OS clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    fn open() -> Result<arboard::Clipboard> {
        arboard::Clipboard::new()
            .map_err(|e| PolishError::Clipboard(format!("Clipboard init failed: {}", e)))
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        match Self::open()?.get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(PolishError::Clipboard(format!(
                "Failed to read clipboard: {}",
                e
            ))),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        Self::open()?
            .set_text(text.to_string())
            .map_err(|e| PolishError::Clipboard(format!("Failed to set clipboard: {}", e)))
    }

    fn clear(&self) -> Result<()> {
        Self::open()?
            .clear()
            .map_err(|e| PolishError::Clipboard(format!("Failed to clear clipboard: {}", e)))
    }
}
