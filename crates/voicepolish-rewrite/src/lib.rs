//! Text rewriting client for VoicePolish.
//!
//! Sends raw dictated text to an OpenAI-compatible chat completions endpoint
//! with a fixed polishing instruction. The client never fails: any service
//! error is logged and the raw text is returned so delivery is never blocked.

pub mod backend;
pub mod client;
pub mod error;
pub mod types;

pub use backend::{ChatBackend, MockBackend, OpenAiBackend};
pub use client::{RewriteClient, POLISH_PROMPT};
pub use error::RewriteError;
