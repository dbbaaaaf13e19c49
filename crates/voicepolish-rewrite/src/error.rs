//! Error types for the rewriting service call.

use voicepolish_core::error::PolishError;

/// Errors from a single chat completions exchange.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response contained no choices")]
    EmptyResponse,
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<RewriteError> for PolishError {
    fn from(err: RewriteError) -> Self {
        PolishError::Rewrite(err.to_string())
    }
}
