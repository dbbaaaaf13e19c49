use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PolishError, Result};

/// Top-level configuration for VoicePolish.
///
/// Loaded once at startup from `~/.voicepolish/config.toml` by default. A
/// `.json` file is read as the flat `{api_key, api_base, model}` object with
/// every other section left at its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolishConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub dictation: DictationConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
}

impl PolishConfig {
    /// Load and validate configuration from a TOML or JSON file.
    ///
    /// Any failure here is fatal: the process must not start without a
    /// usable rewriting-service configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PolishError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        config.validate()?;
        config.timing.enforce_minimums();

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse the sectioned TOML form.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse the flat JSON form: only the rewriting-service keys.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let llm: LlmConfig = serde_json::from_str(content)
            .map_err(|e| PolishError::Config(format!("invalid JSON config: {}", e)))?;
        Ok(Self {
            llm,
            ..Self::default()
        })
    }

    /// Reject configurations that cannot reach the rewriting service.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_key", &self.llm.api_key),
            ("api_base", &self.llm.api_base),
            ("model", &self.llm.model),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(PolishError::Config(format!("missing required key '{}'", key)));
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PolishError::Config(format!(
                "temperature {} outside 0.0..=2.0",
                self.llm.temperature
            )));
        }

        if self.dictation.hotkey.trim().is_empty() {
            return Err(PolishError::Config("hotkey must not be empty".into()));
        }

        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Text rewriting service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    /// Whole-request timeout for the rewriting call.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: String::new(),
            model: String::new(),
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

/// Hotkey and key-injection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Global hotkey that toggles a capture session.
    pub hotkey: String,
    /// Inject key-up events for the modifiers when they are still held after
    /// the release timeout.
    pub release_stuck_modifiers: bool,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            hotkey: "Ctrl+Alt+V".to_string(),
            release_stuck_modifiers: false,
        }
    }
}

/// Fixed delays used to let OS window, focus and IME operations settle.
///
/// Every delay has a documented minimum (the `MIN_*` constants). Values below
/// the minimum are raised by [`TimingConfig::enforce_minimums`] when a config
/// file is loaded; values constructed in code are used as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after spawning the scratch editor before reading the focused window.
    pub scratch_focus_ms: u64,
    /// Wait after injecting the dictation hotkey to start capture.
    pub dictation_start_ms: u64,
    /// Wait after ending capture for the OS to finish typing into the scratch surface.
    pub dictation_settle_ms: u64,
    /// Wait after every focus switch.
    pub focus_settle_ms: u64,
    /// Gap between consecutive synthetic shortcuts.
    pub key_gap_ms: u64,
    /// Upper bound on waiting for the user to release modifier keys.
    pub modifier_release_timeout_ms: u64,
    /// Modifier state polling interval.
    pub modifier_poll_ms: u64,
    /// Captures shorter than this are treated as an accidental double trigger.
    pub min_capture_ms: u64,
    /// Upper bound on each process-termination call.
    pub kill_timeout_ms: u64,
    /// Wait after killing the scratch editor before deleting its file.
    pub teardown_settle_ms: u64,
}

pub const MIN_SCRATCH_FOCUS_MS: u64 = 200;
pub const MIN_DICTATION_START_MS: u64 = 100;
pub const MIN_DICTATION_SETTLE_MS: u64 = 300;
pub const MIN_FOCUS_SETTLE_MS: u64 = 100;
pub const MIN_KEY_GAP_MS: u64 = 50;
pub const MIN_MODIFIER_RELEASE_TIMEOUT_MS: u64 = 500;
pub const MIN_MODIFIER_POLL_MS: u64 = 10;
pub const MIN_KILL_TIMEOUT_MS: u64 = 500;
pub const MIN_TEARDOWN_SETTLE_MS: u64 = 100;

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scratch_focus_ms: 800,
            dictation_start_ms: 500,
            dictation_settle_ms: 800,
            focus_settle_ms: 300,
            key_gap_ms: 200,
            modifier_release_timeout_ms: 2500,
            modifier_poll_ms: 50,
            min_capture_ms: 500,
            kill_timeout_ms: 3000,
            teardown_settle_ms: 300,
        }
    }
}

impl TimingConfig {
    /// Raise every delay below its documented minimum, returning the names of
    /// the fields that were changed.
    pub fn enforce_minimums(&mut self) -> Vec<&'static str> {
        let mut raised = Vec::new();
        let fields: [(&'static str, &mut u64, u64); 9] = [
            ("scratch_focus_ms", &mut self.scratch_focus_ms, MIN_SCRATCH_FOCUS_MS),
            ("dictation_start_ms", &mut self.dictation_start_ms, MIN_DICTATION_START_MS),
            ("dictation_settle_ms", &mut self.dictation_settle_ms, MIN_DICTATION_SETTLE_MS),
            ("focus_settle_ms", &mut self.focus_settle_ms, MIN_FOCUS_SETTLE_MS),
            ("key_gap_ms", &mut self.key_gap_ms, MIN_KEY_GAP_MS),
            (
                "modifier_release_timeout_ms",
                &mut self.modifier_release_timeout_ms,
                MIN_MODIFIER_RELEASE_TIMEOUT_MS,
            ),
            ("modifier_poll_ms", &mut self.modifier_poll_ms, MIN_MODIFIER_POLL_MS),
            ("kill_timeout_ms", &mut self.kill_timeout_ms, MIN_KILL_TIMEOUT_MS),
            ("teardown_settle_ms", &mut self.teardown_settle_ms, MIN_TEARDOWN_SETTLE_MS),
        ];

        for (name, value, min) in fields {
            if *value < min {
                warn!(field = name, configured = *value, minimum = min, "Timing below minimum, raising");
                *value = min;
                raised.push(name);
            }
        }
        raised
    }

    pub fn scratch_focus(&self) -> Duration {
        Duration::from_millis(self.scratch_focus_ms)
    }

    pub fn dictation_start(&self) -> Duration {
        Duration::from_millis(self.dictation_start_ms)
    }

    pub fn dictation_settle(&self) -> Duration {
        Duration::from_millis(self.dictation_settle_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn key_gap(&self) -> Duration {
        Duration::from_millis(self.key_gap_ms)
    }

    pub fn modifier_release_timeout(&self) -> Duration {
        Duration::from_millis(self.modifier_release_timeout_ms)
    }

    pub fn modifier_poll(&self) -> Duration {
        Duration::from_millis(self.modifier_poll_ms)
    }

    pub fn min_capture(&self) -> Duration {
        Duration::from_millis(self.min_capture_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn teardown_settle(&self) -> Duration {
        Duration::from_millis(self.teardown_settle_ms)
    }
}

/// Scratch surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Editor executable launched against the scratch file.
    pub editor: String,
    /// Directory for scratch files. Defaults to the system temp directory.
    pub scratch_dir: Option<PathBuf>,
    /// Editor session-restore directory purged before each session.
    /// Defaults to the Windows 11 Notepad tab-state directory on Windows.
    pub restore_state_dir: Option<PathBuf>,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            editor: default_editor().to_string(),
            scratch_dir: None,
            restore_state_dir: None,
        }
    }
}

#[cfg(target_os = "windows")]
fn default_editor() -> &'static str {
    "notepad.exe"
}

#[cfg(not(target_os = "windows"))]
fn default_editor() -> &'static str {
    "gedit"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PolishConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.dictation.hotkey, "Ctrl+Alt+V");
        assert!(!config.dictation.release_stuck_modifiers);
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.timing.min_capture_ms, 500);
        assert_eq!(config.timing.modifier_release_timeout_ms, 2500);
        assert!(config.scratch.scratch_dir.is_none());
    }

    #[test]
    fn test_default_config_is_invalid_without_credentials() {
        let err = PolishConfig::default().validate().unwrap_err();
        assert!(matches!(err, PolishError::Config(_)));
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_load_toml_config() {
        let content = r#"
[general]
log_level = "debug"

[llm]
api_key = "sk-test"
api_base = "https://llm.example.com/v1"
model = "polish-small"
temperature = 0.2

[dictation]
hotkey = "Ctrl+Shift+Space"

[timing]
dictation_settle_ms = 1200

[scratch]
editor = "notepad++.exe"
scratch_dir = "/tmp/vp"
"#;
        let file = write_temp(content, ".toml");
        let config = PolishConfig::load(file.path()).unwrap();

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.llm.api_base, "https://llm.example.com/v1");
        assert_eq!(config.llm.model, "polish-small");
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.dictation.hotkey, "Ctrl+Shift+Space");
        assert_eq!(config.timing.dictation_settle_ms, 1200);
        // Untouched timing fields keep their defaults.
        assert_eq!(config.timing.focus_settle_ms, 300);
        assert_eq!(config.scratch.editor, "notepad++.exe");
        assert_eq!(config.scratch.scratch_dir, Some(PathBuf::from("/tmp/vp")));
    }

    #[test]
    fn test_load_flat_json_config() {
        let content = r#"{
            "api_key": "sk-json",
            "api_base": "https://api.example.com/v1",
            "model": "gpt-4o-mini"
        }"#;
        let file = write_temp(content, ".json");
        let config = PolishConfig::load(file.path()).unwrap();

        assert_eq!(config.llm.api_key, "sk-json");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.dictation.hotkey, "Ctrl+Alt+V");
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = PolishConfig::load(Path::new("/nonexistent/voicepolish.toml")).unwrap_err();
        assert!(matches!(err, PolishError::Config(_)));
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_load_rejects_missing_model() {
        let content = r#"
[llm]
api_key = "sk-test"
api_base = "https://llm.example.com/v1"
"#;
        let file = write_temp(content, ".toml");
        let err = PolishConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let file = write_temp("{ \"api_key\": ", ".json");
        let err = PolishConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, PolishError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_temperature() {
        let mut config = PolishConfig::default();
        config.llm.api_key = "k".into();
        config.llm.api_base = "http://localhost".into();
        config.llm.model = "m".into();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());

        config.llm.temperature = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enforce_minimums_raises_low_values() {
        let mut timing = TimingConfig {
            focus_settle_ms: 0,
            key_gap_ms: 10,
            min_capture_ms: 0,
            ..TimingConfig::default()
        };
        let raised = timing.enforce_minimums();

        assert_eq!(raised, vec!["focus_settle_ms", "key_gap_ms"]);
        assert_eq!(timing.focus_settle_ms, MIN_FOCUS_SETTLE_MS);
        assert_eq!(timing.key_gap_ms, MIN_KEY_GAP_MS);
        // The capture threshold is not a delay and may be zero.
        assert_eq!(timing.min_capture_ms, 0);
    }

    #[test]
    fn test_defaults_already_satisfy_minimums() {
        let mut timing = TimingConfig::default();
        assert!(timing.enforce_minimums().is_empty());
    }

    #[test]
    fn test_load_applies_minimums() {
        let content = r#"
[llm]
api_key = "sk-test"
api_base = "https://llm.example.com/v1"
model = "m"

[timing]
modifier_poll_ms = 1
"#;
        let file = write_temp(content, ".toml");
        let config = PolishConfig::load(file.path()).unwrap();
        assert_eq!(config.timing.modifier_poll_ms, MIN_MODIFIER_POLL_MS);
    }

    #[test]
    fn test_duration_accessors() {
        let timing = TimingConfig::default();
        assert_eq!(timing.min_capture(), Duration::from_millis(500));
        assert_eq!(timing.modifier_release_timeout(), Duration::from_millis(2500));
        assert_eq!(timing.kill_timeout(), Duration::from_secs(3));
    }
}
