//! In-memory desktop for tests: windows, focus, keyboard and clipboard.
//!
//! `MockDesktop` simulates just enough of the OS for a full session to run:
//! the dictation toggle types `dictated_text` into whichever window was
//! focused when dictation started, Ctrl+C copies the focused window's
//! document, and every paste is recorded with its target.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use voicepolish_core::error::{PolishError, Result};

use crate::clipboard::Clipboard;
use crate::focus::{FocusController, WindowHandle};
use crate::keyboard::{Chord, Keyboard};
use crate::scratch::{ScratchSurface, ScratchSurfaceManager};

#[derive(Debug, Default)]
struct DesktopState {
    focused: Option<WindowHandle>,
    windows: HashMap<WindowHandle, u32>,
    clipboard: String,
    clipboard_writes: Vec<String>,
    dictating: bool,
    dictation_target: Option<WindowHandle>,
    dictated_text: String,
    documents: HashMap<WindowHandle, String>,
    held_polls: usize,
    chord_log: Vec<(Chord, Option<WindowHandle>)>,
    pastes: Vec<(Option<WindowHandle>, String)>,
    clobber_on_paste: Option<String>,
    modifier_releases: usize,
}

/// Fake desktop implementing [`FocusController`], [`Keyboard`] and [`Clipboard`].
#[derive(Debug, Default)]
pub struct MockDesktop {
    state: Mutex<DesktopState>,
}

impl MockDesktop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a window owned by `pid`.
    pub fn add_window(&self, window: WindowHandle, pid: u32) {
        self.lock().windows.insert(window, pid);
    }

    pub fn close_window(&self, window: WindowHandle) {
        let mut state = self.lock();
        state.windows.remove(&window);
        state.documents.remove(&window);
        if state.focused == Some(window) {
            state.focused = None;
        }
    }

    /// Put `window` in front, as if the user clicked it.
    pub fn focus(&self, window: WindowHandle) {
        self.lock().focused = Some(window);
    }

    /// Text the OS dictation feature will "hear" on the next session.
    pub fn set_dictated_text(&self, text: &str) {
        self.lock().dictated_text = text.to_string();
    }

    /// Report modifiers as held for the next `polls` queries.
    pub fn hold_modifiers_for(&self, polls: usize) {
        self.lock().held_polls = polls;
    }

    /// After the next paste, overwrite the clipboard with `text`.
    pub fn set_clobber_on_paste(&self, text: &str) {
        self.lock().clobber_on_paste = Some(text.to_string());
    }

    pub fn clipboard_writes(&self) -> Vec<String> {
        self.lock().clipboard_writes.clone()
    }

    pub fn chords(&self) -> Vec<Chord> {
        self.lock().chord_log.iter().map(|(chord, _)| *chord).collect()
    }

    /// Chords with the window that was focused when each was sent.
    pub fn chord_log(&self) -> Vec<(Chord, Option<WindowHandle>)> {
        self.lock().chord_log.clone()
    }

    /// Each paste's target window and the clipboard content at that moment.
    pub fn pastes(&self) -> Vec<(Option<WindowHandle>, String)> {
        self.lock().pastes.clone()
    }

    pub fn modifier_releases(&self) -> usize {
        self.lock().modifier_releases
    }

    pub fn document(&self, window: WindowHandle) -> Option<String> {
        self.lock().documents.get(&window).cloned()
    }

    pub fn is_dictating(&self) -> bool {
        self.lock().dictating
    }
}

#[async_trait]
impl FocusController for MockDesktop {
    fn current(&self) -> Option<WindowHandle> {
        self.lock().focused
    }

    fn set_foreground(&self, window: WindowHandle) -> Result<()> {
        let mut state = self.lock();
        if !state.windows.contains_key(&window) {
            return Err(PolishError::Focus(format!("window {} no longer exists", window)));
        }
        state.focused = Some(window);
        Ok(())
    }

    fn owner_process(&self, window: WindowHandle) -> Option<u32> {
        self.lock().windows.get(&window).copied()
    }
}

impl Keyboard for MockDesktop {
    fn modifiers_held(&self) -> bool {
        let mut state = self.lock();
        if state.held_polls == 0 {
            return false;
        }
        state.held_polls -= 1;
        true
    }

    fn send_chord(&self, chord: Chord) -> Result<()> {
        let mut state = self.lock();
        let focused = state.focused;
        state.chord_log.push((chord, focused));

        match chord {
            Chord::DictationToggle => {
                if state.dictating {
                    state.dictating = false;
                    if let Some(target) = state.dictation_target.take() {
                        let heard = std::mem::take(&mut state.dictated_text);
                        state.documents.entry(target).or_default().push_str(&heard);
                    }
                } else {
                    state.dictating = true;
                    state.dictation_target = focused;
                }
            }
            Chord::SelectAll => {}
            Chord::Copy => {
                if let Some(text) = focused.and_then(|w| state.documents.get(&w).cloned()) {
                    state.clipboard = text;
                }
            }
            Chord::Paste => {
                let content = state.clipboard.clone();
                state.pastes.push((focused, content));
                if let Some(clobber) = state.clobber_on_paste.take() {
                    state.clipboard = clobber;
                }
            }
        }
        Ok(())
    }

    fn release_modifiers(&self) -> Result<()> {
        let mut state = self.lock();
        state.held_polls = 0;
        state.modifier_releases += 1;
        Ok(())
    }
}

impl Clipboard for MockDesktop {
    fn read_text(&self) -> Result<String> {
        Ok(self.lock().clipboard.clone())
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.clipboard = text.to_string();
        state.clipboard_writes.push(text.to_string());
        Ok(())
    }
}

/// Scratch manager that opens fake editor windows on a [`MockDesktop`].
#[derive(Debug)]
pub struct MockScratch {
    desktop: Arc<MockDesktop>,
    next_handle: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    purges: AtomicUsize,
    fail_open: AtomicBool,
    focus_on_open: AtomicBool,
}

impl MockScratch {
    pub const EDITOR_PID: u32 = 31337;

    pub fn new(desktop: Arc<MockDesktop>) -> Arc<Self> {
        Arc::new(Self {
            desktop,
            next_handle: AtomicUsize::new(9000),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            purges: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            focus_on_open: AtomicBool::new(true),
        })
    }

    /// Make subsequent `open` calls fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Whether newly opened editor windows take focus.
    pub fn set_focus_on_open(&self, focus: bool) {
        self.focus_on_open.store(focus, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    /// Surfaces opened and not yet closed.
    pub fn live(&self) -> usize {
        self.opens() - self.closes()
    }
}

#[async_trait]
impl ScratchSurfaceManager for MockScratch {
    fn purge_restore_state(&self) -> usize {
        self.purges.fetch_add(1, Ordering::SeqCst);
        0
    }

    async fn open(&self) -> Result<ScratchSurface> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PolishError::Scratch("mock editor failed to launch".into()));
        }
        let n = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let window = WindowHandle(n as isize);
        self.desktop.add_window(window, Self::EDITOR_PID);
        if self.focus_on_open.load(Ordering::SeqCst) {
            self.desktop.focus(window);
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        // Like the real editor, report whatever ended up in front.
        Ok(ScratchSurface::new(
            self.desktop.current(),
            PathBuf::from(format!("mock-scratch-{}.txt", n)),
            None,
        ))
    }

    async fn close(&self, surface: ScratchSurface) {
        if let Some(window) = surface.window {
            self.desktop.close_window(window);
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictation_types_into_focused_window() {
        let desktop = MockDesktop::new();
        desktop.add_window(WindowHandle(5), 1);
        desktop.focus(WindowHandle(5));
        desktop.set_dictated_text("hello");

        desktop.send_chord(Chord::DictationToggle).unwrap();
        assert!(desktop.is_dictating());
        desktop.send_chord(Chord::DictationToggle).unwrap();
        assert!(!desktop.is_dictating());
        assert_eq!(desktop.document(WindowHandle(5)).as_deref(), Some("hello"));

        desktop.send_chord(Chord::SelectAll).unwrap();
        desktop.send_chord(Chord::Copy).unwrap();
        assert_eq!(desktop.read_text().unwrap(), "hello");
    }

    #[test]
    fn test_paste_records_target_and_clobbers() {
        let desktop = MockDesktop::new();
        desktop.add_window(WindowHandle(1), 1);
        desktop.focus(WindowHandle(1));
        desktop.write_text("polished").unwrap();
        desktop.set_clobber_on_paste("stale");

        desktop.send_chord(Chord::Paste).unwrap();
        assert_eq!(
            desktop.pastes(),
            vec![(Some(WindowHandle(1)), "polished".to_string())]
        );
        assert_eq!(desktop.read_text().unwrap(), "stale");
    }

    #[tokio::test]
    async fn test_mock_scratch_lifecycle() {
        let desktop = MockDesktop::new();
        let scratch = MockScratch::new(desktop.clone());

        let surface = scratch.open().await.unwrap();
        let window = surface.window.unwrap();
        assert_eq!(desktop.current(), Some(window));
        assert_eq!(desktop.owner_process(window), Some(MockScratch::EDITOR_PID));
        assert_eq!(scratch.live(), 1);

        scratch.close(surface).await;
        assert_eq!(scratch.live(), 0);
        assert!(desktop.owner_process(window).is_none());

        scratch.set_fail_open(true);
        assert!(scratch.open().await.is_err());
    }
}
