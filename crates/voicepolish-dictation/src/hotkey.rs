//! Global hotkey registration for the session toggle.
//!
//! On Windows, uses the `global-hotkey` crate to register a system-wide
//! hotkey. Registration is tied to the calling thread, which must pump
//! window messages (see [`HotkeyService::pump_messages`]) for presses to be
//! delivered.
//!
//! On non-Windows, provides a stub that registers nothing and never fires.

use voicepolish_core::error::PolishError;

/// Configuration for the session hotkey.
#[derive(Debug, Clone)]
pub struct HotkeyConfig {
    /// Key combination string (e.g., "Ctrl+Alt+V", "Ctrl+Shift+F9").
    pub key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            key: "Ctrl+Alt+V".to_string(),
        }
    }
}

/// Owns the registered global hotkey.
pub struct HotkeyService {
    config: HotkeyConfig,
    #[cfg(target_os = "windows")]
    manager: global_hotkey::GlobalHotKeyManager,
    #[cfg(target_os = "windows")]
    hotkey: Option<global_hotkey::hotkey::HotKey>,
}

impl HotkeyService {
    /// Parse the key string and register it with the OS.
    #[cfg(target_os = "windows")]
    pub fn new(config: HotkeyConfig) -> Result<Self, PolishError> {
        use global_hotkey::hotkey::HotKey;
        use global_hotkey::GlobalHotKeyManager;
        use std::str::FromStr;

        let manager = GlobalHotKeyManager::new().map_err(|e| {
            PolishError::Hotkey(format!("Failed to create hotkey manager: {}", e))
        })?;

        let hotkey = HotKey::from_str(&config.key).map_err(|e| {
            PolishError::Hotkey(format!("Failed to parse hotkey '{}': {}", config.key, e))
        })?;

        manager.register(hotkey).map_err(|e| {
            PolishError::Hotkey(format!(
                "Failed to register hotkey '{}': {}",
                config.key, e
            ))
        })?;

        tracing::info!(key = %config.key, "Global hotkey registered");

        Ok(Self {
            config,
            manager,
            hotkey: Some(hotkey),
        })
    }

    /// Stub constructor for non-Windows platforms.
    #[cfg(not(target_os = "windows"))]
    pub fn new(config: HotkeyConfig) -> Result<Self, PolishError> {
        if config.key.trim().is_empty() {
            return Err(PolishError::Hotkey("Hotkey must not be empty".into()));
        }
        tracing::warn!(key = %config.key, "Global hotkey is only available on Windows");
        Ok(Self { config })
    }

    pub fn config(&self) -> &HotkeyConfig {
        &self.config
    }

    /// Dispatch pending window messages for this thread.
    #[cfg(target_os = "windows")]
    pub fn pump_messages(&self) {
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
        };

        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            while PeekMessageW(&mut msg, 0, 0, 0, PM_REMOVE) != 0 {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    /// Stub: nothing to pump on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn pump_messages(&self) {}

    /// Whether the hotkey was pressed since the last check.
    ///
    /// Drains every queued event; repeated presses between two checks count
    /// once. Release events are ignored.
    #[cfg(target_os = "windows")]
    pub fn was_pressed(&self) -> bool {
        use global_hotkey::{GlobalHotKeyEvent, HotKeyState};

        let Some(hotkey) = &self.hotkey else {
            return false;
        };
        let mut pressed = false;
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if event.id() == hotkey.id() && event.state() == HotKeyState::Pressed {
                pressed = true;
            }
        }
        pressed
    }

    /// Stub: always returns false on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn was_pressed(&self) -> bool {
        false
    }

    /// Unregister the hotkey.
    #[cfg(target_os = "windows")]
    pub fn unregister(&mut self) {
        if let Some(hotkey) = self.hotkey.take() {
            let _ = self.manager.unregister(hotkey);
            tracing::info!(key = %self.config.key, "Global hotkey unregistered");
        }
    }

    /// Stub unregister.
    #[cfg(not(target_os = "windows"))]
    pub fn unregister(&mut self) {}
}

#[cfg(target_os = "windows")]
impl Drop for HotkeyService {
    fn drop(&mut self) {
        self.unregister();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotkey_config_default() {
        let config = HotkeyConfig::default();
        assert_eq!(config.key, "Ctrl+Alt+V");
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_default_hotkey_parses() {
        use global_hotkey::hotkey::HotKey;
        use std::str::FromStr;

        assert!(HotKey::from_str(&HotkeyConfig::default().key).is_ok());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_hotkey_service_stub() {
        let service = HotkeyService::new(HotkeyConfig::default()).unwrap();
        assert_eq!(service.config().key, "Ctrl+Alt+V");
        service.pump_messages();
        assert!(!service.was_pressed());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_hotkey_service_rejects_empty_key() {
        let config = HotkeyConfig { key: "  ".into() };
        match HotkeyService::new(config) {
            Err(PolishError::Hotkey(msg)) => assert!(msg.contains("empty")),
            other => panic!("Expected Hotkey error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_hotkey_service_unregister_noop() {
        let mut service = HotkeyService::new(HotkeyConfig::default()).unwrap();
        service.unregister();
    }
}
