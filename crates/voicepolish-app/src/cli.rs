//! CLI argument definitions for the VoicePolish application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// VoicePolish: dictate anywhere, paste back polished text.
#[derive(Parser, Debug)]
#[command(name = "voicepolish", version, about)]
pub struct CliArgs {
    /// Path to the configuration file (TOML, or flat JSON with a .json extension).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Global hotkey that starts and stops a session (e.g. "Ctrl+Alt+V").
    #[arg(long = "hotkey")]
    pub hotkey: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VOICEPOLISH_CONFIG env var > ~/.voicepolish/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VOICEPOLISH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value > "info".
    /// `RUST_LOG` overrides both when the subscriber is built.
    pub fn resolve_log_level(&self, config_level: Option<&str>) -> String {
        self.log_level
            .as_deref()
            .or(config_level)
            .filter(|level| !level.trim().is_empty())
            .unwrap_or("info")
            .to_string()
    }

    /// Resolve the hotkey.
    ///
    /// Priority: --hotkey flag > config file value.
    pub fn resolve_hotkey(&self, config_hotkey: &str) -> String {
        self.hotkey
            .clone()
            .unwrap_or_else(|| config_hotkey.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".voicepolish").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".voicepolish").join("config.toml");
    }
    PathBuf::from("config.toml")
}
