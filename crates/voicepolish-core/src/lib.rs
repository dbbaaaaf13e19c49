//! Shared configuration and error types for VoicePolish.

pub mod config;
pub mod error;

pub use config::PolishConfig;
pub use error::{PolishError, Result};
