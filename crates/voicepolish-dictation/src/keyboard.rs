//! Synthetic keyboard shortcuts via the Windows SendInput API.
//!
//! On Windows, each chord is sent as one `SendInput` batch: key-downs in
//! order, then key-ups in reverse order. Modifier state is read with
//! `GetAsyncKeyState`, which reflects the physical keyboard.
//!
//! On non-Windows, provides a stub that reports no held modifiers and refuses
//! to inject.

use std::fmt;

use voicepolish_core::error::{PolishError, Result};

/// Shortcuts the orchestrator injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chord {
    /// OS dictation toggle (Win+H).
    DictationToggle,
    /// Ctrl+A.
    SelectAll,
    /// Ctrl+C.
    Copy,
    /// Ctrl+V.
    Paste,
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chord::DictationToggle => write!(f, "Win+H"),
            Chord::SelectAll => write!(f, "Ctrl+A"),
            Chord::Copy => write!(f, "Ctrl+C"),
            Chord::Paste => write!(f, "Ctrl+V"),
        }
    }
}

/// Physical modifier state and synthetic key injection.
pub trait Keyboard: Send + Sync {
    /// Whether any of Ctrl, Alt, Shift or the Windows key is held down.
    fn modifiers_held(&self) -> bool;

    /// Press and release `chord` in the focused window.
    fn send_chord(&self, chord: Chord) -> Result<()>;

    /// Inject key-up events for every modifier.
    fn release_modifiers(&self) -> Result<()>;
}

/// Keyboard backed by `SendInput` / `GetAsyncKeyState`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsKeyboard;

impl WindowsKeyboard {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "windows")]
mod vk {
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const LWIN: u16 = 0x5B;
    pub const RWIN: u16 = 0x5C;
    pub const KEY_A: u16 = 0x41;
    pub const KEY_C: u16 = 0x43;
    pub const KEY_H: u16 = 0x48;
    pub const KEY_V: u16 = 0x56;

    pub const MODIFIERS: [u16; 5] = [CONTROL, MENU, SHIFT, LWIN, RWIN];
}

#[cfg(target_os = "windows")]
fn chord_keys(chord: Chord) -> &'static [u16] {
    match chord {
        Chord::DictationToggle => &[vk::LWIN, vk::KEY_H],
        Chord::SelectAll => &[vk::CONTROL, vk::KEY_A],
        Chord::Copy => &[vk::CONTROL, vk::KEY_C],
        Chord::Paste => &[vk::CONTROL, vk::KEY_V],
    }
}

#[cfg(target_os = "windows")]
fn key_input(
    key: u16,
    key_up: bool,
) -> windows_sys::Win32::UI::Input::KeyboardAndMouse::INPUT {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP,
    };

    let mut flags = 0;
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    if key == vk::LWIN || key == vk::RWIN {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: key,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

#[cfg(target_os = "windows")]
fn send_inputs(inputs: &[windows_sys::Win32::UI::Input::KeyboardAndMouse::INPUT]) -> Result<()> {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{SendInput, INPUT};

    let sent = unsafe {
        SendInput(
            inputs.len() as u32,
            inputs.as_ptr(),
            std::mem::size_of::<INPUT>() as i32,
        )
    };

    if sent as usize != inputs.len() {
        return Err(PolishError::Input(format!(
            "SendInput only sent {} of {} events",
            sent,
            inputs.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Windows implementation
// =============================================================================

#[cfg(target_os = "windows")]
impl Keyboard for WindowsKeyboard {
    fn modifiers_held(&self) -> bool {
        use windows_sys::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

        // High bit set means the key is down right now.
        vk::MODIFIERS
            .iter()
            .any(|&key| unsafe { GetAsyncKeyState(key as i32) } < 0)
    }

    fn send_chord(&self, chord: Chord) -> Result<()> {
        let keys = chord_keys(chord);
        let mut inputs = Vec::with_capacity(keys.len() * 2);
        inputs.extend(keys.iter().map(|&key| key_input(key, false)));
        inputs.extend(keys.iter().rev().map(|&key| key_input(key, true)));

        send_inputs(&inputs)?;
        tracing::debug!(chord = %chord, "Chord injected");
        Ok(())
    }

    fn release_modifiers(&self) -> Result<()> {
        let inputs: Vec<_> = vk::MODIFIERS
            .iter()
            .map(|&key| key_input(key, true))
            .collect();
        send_inputs(&inputs)?;
        tracing::debug!("Modifier key-ups injected");
        Ok(())
    }
}

// =============================================================================
// Non-Windows stub
// =============================================================================

#[cfg(not(target_os = "windows"))]
impl Keyboard for WindowsKeyboard {
    fn modifiers_held(&self) -> bool {
        false
    }

    fn send_chord(&self, chord: Chord) -> Result<()> {
        tracing::warn!(chord = %chord, "Key injection not available on this platform");
        Err(PolishError::Input(
            "Key injection is only available on Windows".into(),
        ))
    }

    fn release_modifiers(&self) -> Result<()> {
        Err(PolishError::Input(
            "Key injection is only available on Windows".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
