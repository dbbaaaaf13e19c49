//! Scratch surface lifecycle: a temporary text file opened in an editor for
//! the OS dictation feature to type into.
//!
//! Teardown resolves the process that owns the editor window rather than
//! trusting the spawned pid, since packaged editors hand the file to a
//! different host process. Every cleanup step tolerates its target already
//! being gone.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use voicepolish_core::config::{ScratchConfig, TimingConfig};
use voicepolish_core::error::{PolishError, Result};

use crate::focus::{FocusController, WindowHandle};

/// A live scratch surface.
#[derive(Debug)]
pub struct ScratchSurface {
    /// Editor window, as observed once it took focus.
    pub window: Option<WindowHandle>,
    /// Backing file.
    pub path: PathBuf,
    child: Option<Child>,
}

impl ScratchSurface {
    pub fn new(window: Option<WindowHandle>, path: PathBuf, child: Option<Child>) -> Self {
        Self {
            window,
            path,
            child,
        }
    }

    /// Pid of the process that was spawned, if it has not been reaped.
    pub fn spawned_pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

/// Creates and destroys scratch surfaces.
#[async_trait]
pub trait ScratchSurfaceManager: Send + Sync {
    /// Delete the editor's session-restore data so unrelated content from an
    /// earlier editor session cannot reappear. Returns the number of entries
    /// removed.
    fn purge_restore_state(&self) -> usize;

    /// Create an empty backing file, launch the editor on it and return once
    /// the editor has had time to take focus.
    async fn open(&self) -> Result<ScratchSurface>;

    /// Terminate the editor and delete the backing file. Never fails.
    async fn close(&self, surface: ScratchSurface);
}

/// Scratch surface backed by an external editor process.
pub struct EditorScratch {
    editor: String,
    scratch_dir: PathBuf,
    restore_state_dir: Option<PathBuf>,
    focus: Arc<dyn FocusController>,
    focus_wait: Duration,
    kill_timeout: Duration,
    settle: Duration,
}

impl std::fmt::Debug for EditorScratch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorScratch")
            .field("editor", &self.editor)
            .field("scratch_dir", &self.scratch_dir)
            .field("restore_state_dir", &self.restore_state_dir)
            .finish()
    }
}

impl EditorScratch {
    pub fn new(
        config: &ScratchConfig,
        timing: &TimingConfig,
        focus: Arc<dyn FocusController>,
    ) -> Self {
        Self {
            editor: config.editor.clone(),
            scratch_dir: config
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            restore_state_dir: config
                .restore_state_dir
                .clone()
                .or_else(default_restore_state_dir),
            focus,
            focus_wait: timing.scratch_focus(),
            kill_timeout: timing.kill_timeout(),
            settle: timing.teardown_settle(),
        }
    }

    fn create_backing_file(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let file = tempfile::Builder::new()
            .prefix("vp_")
            .suffix(".txt")
            .tempfile_in(&self.scratch_dir)?;
        // Keep the file past this handle; the editor needs to open it.
        let (handle, path) = file
            .keep()
            .map_err(|e| PolishError::Scratch(format!("cannot keep scratch file: {}", e)))?;
        drop(handle);
        Ok(path)
    }
}

#[async_trait]
impl ScratchSurfaceManager for EditorScratch {
    fn purge_restore_state(&self) -> usize {
        let Some(dir) = &self.restore_state_dir else {
            return 0;
        };
        let removed = purge_dir(dir);
        if removed > 0 {
            tracing::debug!(dir = %dir.display(), removed, "Editor restore state purged");
        }
        removed
    }

    async fn open(&self) -> Result<ScratchSurface> {
        let path = self.create_backing_file()?;

        let child = match Command::new(&self.editor).arg(&path).spawn() {
            Ok(child) => child,
            Err(e) => {
                remove_quietly(&path).await;
                return Err(PolishError::Scratch(format!(
                    "failed to launch '{}': {}",
                    self.editor, e
                )));
            }
        };

        tokio::time::sleep(self.focus_wait).await;
        let window = self.focus.current();
        if window.is_none() {
            tracing::warn!("Scratch editor did not report a foreground window");
        }

        let surface = ScratchSurface::new(window, path, Some(child));
        tracing::info!(
            pid = ?surface.spawned_pid(),
            window = ?surface.window,
            path = %surface.path.display(),
            "Scratch surface opened"
        );
        Ok(surface)
    }

    async fn close(&self, mut surface: ScratchSurface) {
        let spawned = surface.spawned_pid();
        let owner = surface
            .window
            .and_then(|w| self.focus.owner_process(w))
            .filter(|&pid| pid != std::process::id());

        if let Some(pid) = owner {
            kill_process(pid, false, self.kill_timeout).await;
        }
        if let Some(pid) = spawned.filter(|&pid| Some(pid) != owner) {
            kill_process(pid, true, self.kill_timeout).await;
        }
        if let Some(mut child) = surface.child.take() {
            let _ = child.start_kill();
            let _ = tokio::time::timeout(self.kill_timeout, child.wait()).await;
        }

        // Give the editor time to release its handle on the file.
        tokio::time::sleep(self.settle).await;
        remove_quietly(&surface.path).await;

        tracing::info!(
            owner_pid = ?owner,
            spawned_pid = ?spawned,
            path = %surface.path.display(),
            "Scratch surface closed"
        );
    }
}

/// Windows 11 Notepad keeps reopened tabs here.
#[cfg(target_os = "windows")]
pub fn default_restore_state_dir() -> Option<PathBuf> {
    let local = std::env::var_os("LOCALAPPDATA")?;
    Some(
        PathBuf::from(local)
            .join("Packages")
            .join("Microsoft.WindowsNotepad_8wekyb3d8bbwe")
            .join("LocalState")
            .join("TabState"),
    )
}

#[cfg(not(target_os = "windows"))]
pub fn default_restore_state_dir() -> Option<PathBuf> {
    None
}

fn purge_dir(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            let path = entry.path();
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            removed.is_ok()
        })
        .count()
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Scratch file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "Scratch file not removed"),
    }
}

async fn kill_process(pid: u32, tree: bool, limit: Duration) {
    let mut cmd = kill_command(pid, tree);
    cmd.stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);

    match tokio::time::timeout(limit, cmd.status()).await {
        Ok(Ok(status)) => tracing::debug!(pid, %status, "Kill command finished"),
        Ok(Err(e)) => tracing::debug!(pid, error = %e, "Kill command failed to run"),
        Err(_) => tracing::debug!(pid, "Kill command timed out"),
    }
}

#[cfg(target_os = "windows")]
fn kill_command(pid: u32, tree: bool) -> Command {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let pid = pid.to_string();
    let mut cmd = Command::new("taskkill");
    cmd.args(["/F", "/PID", pid.as_str()]);
    if tree {
        cmd.arg("/T");
    }
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(target_os = "windows"))]
fn kill_command(pid: u32, _tree: bool) -> Command {
    let pid = pid.to_string();
    let mut cmd = Command::new("kill");
    cmd.args(["-KILL", pid.as_str()]);
    cmd
}
