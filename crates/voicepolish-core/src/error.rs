use thiserror::Error;

/// Top-level error type for VoicePolish.
///
/// Only `Config` is fatal to the process. Every other variant is raised by a
/// collaborator during a session and is logged by the orchestrator, which then
/// degrades or aborts the session instead of propagating further.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolishError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dictation error: {0}")]
    Dictation(String),

    #[error("Focus error: {0}")]
    Focus(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Scratch surface error: {0}")]
    Scratch(String),

    #[error("Hotkey error: {0}")]
    Hotkey(String),

    #[error("Rewrite error: {0}")]
    Rewrite(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PolishError {
    fn from(err: toml::de::Error) -> Self {
        PolishError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PolishError {
    fn from(err: serde_json::Error) -> Self {
        PolishError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for VoicePolish operations.
pub type Result<T> = std::result::Result<T, PolishError>;
