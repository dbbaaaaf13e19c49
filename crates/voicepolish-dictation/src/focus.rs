//! Foreground window tracking and switching.
//!
//! On Windows, uses `GetForegroundWindow` / `SetForegroundWindow` and resolves
//! the process that actually owns a window via `GetWindowThreadProcessId`.
//! Packaged apps such as Windows 11 Notepad are hosted by a different process
//! than the one `CreateProcess` returned, so the spawned pid is not enough to
//! terminate them.
//!
//! On non-Windows, provides a stub that reports no foreground window.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use voicepolish_core::error::{PolishError, Result};

/// Opaque native window handle (`HWND` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Queries and changes which window is frontmost.
#[async_trait]
pub trait FocusController: Send + Sync {
    /// The presently frontmost window, if any.
    fn current(&self) -> Option<WindowHandle>;

    /// Ask the OS to bring `window` to the front.
    fn set_foreground(&self, window: WindowHandle) -> Result<()>;

    /// Process id of the process backing `window`.
    fn owner_process(&self, window: WindowHandle) -> Option<u32>;

    /// Bring `window` to the front and wait `settle` for the switch to land.
    ///
    /// A missing, null or invalid handle is a no-op.
    async fn activate(&self, window: Option<WindowHandle>, settle: Duration) {
        let Some(window) = window.filter(|w| !w.is_null()) else {
            tracing::debug!("No window to activate");
            return;
        };
        match self.set_foreground(window) {
            Ok(()) => {
                tracing::debug!(window = %window, "Window activated");
                tokio::time::sleep(settle).await;
            }
            Err(e) => tracing::warn!(window = %window, error = %e, "Failed to activate window"),
        }
    }
}

/// Win32 focus controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsFocusController;

impl WindowsFocusController {
    pub fn new() -> Self {
        Self
    }
}

// =============================================================================
// Windows implementation
// =============================================================================

#[cfg(target_os = "windows")]
impl FocusController for WindowsFocusController {
    fn current(&self) -> Option<WindowHandle> {
        use windows_sys::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd == 0 {
            None
        } else {
            Some(WindowHandle(hwnd))
        }
    }

    fn set_foreground(&self, window: WindowHandle) -> Result<()> {
        use windows_sys::Win32::UI::WindowsAndMessaging::{IsWindow, SetForegroundWindow};

        unsafe {
            if IsWindow(window.0) == 0 {
                return Err(PolishError::Focus(format!("window {} no longer exists", window)));
            }
            if SetForegroundWindow(window.0) == 0 {
                return Err(PolishError::Focus(format!(
                    "SetForegroundWindow refused for {}",
                    window
                )));
            }
        }
        Ok(())
    }

    fn owner_process(&self, window: WindowHandle) -> Option<u32> {
        use windows_sys::Win32::UI::WindowsAndMessaging::GetWindowThreadProcessId;

        let mut pid = 0u32;
        unsafe {
            GetWindowThreadProcessId(window.0, &mut pid);
        }
        (pid != 0).then_some(pid)
    }
}

// =============================================================================
// Non-Windows stub
// =============================================================================

#[cfg(not(target_os = "windows"))]
impl FocusController for WindowsFocusController {
    fn current(&self) -> Option<WindowHandle> {
        None
    }

    fn set_foreground(&self, window: WindowHandle) -> Result<()> {
        Err(PolishError::Focus(format!(
            "cannot focus {}: window focus is only available on Windows",
            window
        )))
    }

    fn owner_process(&self, _window: WindowHandle) -> Option<u32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDesktop;

    #[test]
    fn test_window_handle_display_and_null() {
        assert_eq!(WindowHandle(0x1a2b).to_string(), "0x1a2b");
        assert!(WindowHandle(0).is_null());
        assert!(!WindowHandle(42).is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_switches_focus() {
        let desktop = MockDesktop::new();
        desktop.add_window(WindowHandle(1), 100);
        desktop.add_window(WindowHandle(2), 200);
        desktop.focus(WindowHandle(1));

        desktop
            .activate(Some(WindowHandle(2)), Duration::from_millis(300))
            .await;
        assert_eq!(desktop.current(), Some(WindowHandle(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_null_or_missing_is_noop() {
        let desktop = MockDesktop::new();
        desktop.add_window(WindowHandle(1), 100);
        desktop.focus(WindowHandle(1));

        desktop.activate(None, Duration::from_millis(300)).await;
        desktop
            .activate(Some(WindowHandle(0)), Duration::from_millis(300))
            .await;
        // Unknown window: set_foreground fails, focus stays put.
        desktop
            .activate(Some(WindowHandle(99)), Duration::from_millis(300))
            .await;

        assert_eq!(desktop.current(), Some(WindowHandle(1)));
    }

    #[test]
    fn test_owner_process_differs_from_spawn() {
        let desktop = MockDesktop::new();
        desktop.add_window(WindowHandle(7), 4242);
        assert_eq!(desktop.owner_process(WindowHandle(7)), Some(4242));
        assert_eq!(desktop.owner_process(WindowHandle(8)), None);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_stub_reports_no_window() {
        let focus = WindowsFocusController::new();
        assert!(focus.current().is_none());
        assert!(focus.set_foreground(WindowHandle(1)).is_err());
        assert!(focus.owner_process(WindowHandle(1)).is_none());
    }
}
