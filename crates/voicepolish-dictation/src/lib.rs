//! VoicePolish dictation crate - capture session state machine and OS collaborators.
//!
//! A session moves through a strict state machine: Idle -> Recording ->
//! Polishing -> Idle. The orchestrator opens a scratch editor for the OS
//! dictation feature to type into, copies the captured text out, has it
//! polished, and pastes the result back into the window the user started in.
//! Platform access (focus, keyboard, clipboard, scratch editor, hotkey) sits
//! behind traits so the orchestrator can be driven by the in-memory `mock`
//! desktop in tests.

pub mod clipboard;
pub mod focus;
pub mod hotkey;
pub mod input_sync;
pub mod keyboard;
pub mod mock;
pub mod orchestrator;
pub mod scratch;
pub mod session;
pub mod state;

pub use clipboard::{Clipboard, SystemClipboard};
pub use focus::{FocusController, WindowHandle, WindowsFocusController};
pub use hotkey::{HotkeyConfig, HotkeyService};
pub use input_sync::InputSynchronizer;
pub use keyboard::{Chord, Keyboard, WindowsKeyboard};
pub use orchestrator::{Collaborators, SessionOrchestrator, SessionOutcome, Toggle};
pub use scratch::{EditorScratch, ScratchSurface, ScratchSurfaceManager};
pub use session::Session;
pub use state::{DictationState, StateMachine, Trigger};
