//! The rewriting client used by the session orchestrator.

use std::sync::Arc;

use voicepolish_core::config::LlmConfig;

use crate::backend::{ChatBackend, OpenAiBackend};
use crate::error::RewriteError;
use crate::types::{ChatMessage, ChatRequest};

/// Fixed system instruction sent with every rewrite.
pub const POLISH_PROMPT: &str = "You polish text captured by voice dictation. Rewrite the user's text so that:
1. Filler words and interjections (um, uh, er, 嗯, 呃, 啊, 哦, 额) are removed, while words that carry meaning are kept.
2. Unnatural spaces and spacing are fixed.
3. Broken fragments are merged into fluent, complete sentences.
4. The original meaning is preserved; nothing is added or changed.
5. Technical terms, identifiers and code-related wording stay exactly as spoken.
6. Only the rewritten text is output, with no explanation.";

/// Sends raw dictated text to the rewriting service.
///
/// [`RewriteClient::rewrite`] never fails: service errors degrade to the raw
/// text so delivery always proceeds.
#[derive(Clone)]
pub struct RewriteClient {
    backend: Arc<dyn ChatBackend>,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for RewriteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteClient")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl RewriteClient {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature,
        }
    }

    /// Build a client backed by the HTTP service described in `config`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, RewriteError> {
        let backend = OpenAiBackend::new(config)?;
        tracing::info!(endpoint = %backend.endpoint(), model = %config.model, "Rewriting service configured");
        Ok(Self::new(Arc::new(backend), config.model.clone(), config.temperature))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Polish `raw_text`.
    ///
    /// Whitespace-only input returns `""` without a service call. On any
    /// service failure the trimmed raw text is returned unchanged.
    pub async fn rewrite(&self, raw_text: &str) -> String {
        let raw = raw_text.trim();
        if raw.is_empty() {
            return String::new();
        }

        match self.backend.complete(&self.build_request(raw)).await {
            Ok(polished) if polished.trim().is_empty() => {
                tracing::warn!("Rewriting service returned blank text, delivering raw text");
                raw.to_string()
            }
            Ok(polished) => {
                let polished = polished.trim().to_string();
                tracing::info!(
                    raw_len = raw.chars().count(),
                    polished_len = polished.chars().count(),
                    "Text polished"
                );
                polished
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rewriting service call failed, delivering raw text");
                raw.to_string()
            }
        }
    }

    fn build_request(&self, raw: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(POLISH_PROMPT), ChatMessage::user(raw)],
            temperature: self.temperature,
            stream: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::types::Role;

    fn client_with(backend: Arc<MockBackend>) -> RewriteClient {
        RewriteClient::new(backend, "test-model", 0.3)
    }

    #[tokio::test]
    async fn test_empty_input_skips_service() {
        let backend = Arc::new(MockBackend::echo());
        let client = client_with(Arc::clone(&backend));

        assert_eq!(client.rewrite("").await, "");
        assert_eq!(client.rewrite("   ").await, "");
        assert_eq!(client.rewrite("\n\t ").await, "");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_returns_raw_text_unchanged() {
        let backend = Arc::new(MockBackend::failing());
        let client = client_with(Arc::clone(&backend));

        assert_eq!(client.rewrite("hello  uh world").await, "hello  uh world");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_falls_back_to_raw() {
        let backend = Arc::new(MockBackend::new(Box::new(|_| {
            Err(RewriteError::EmptyResponse)
        })));
        let client = client_with(backend);

        assert_eq!(client.rewrite("keep me").await, "keep me");
    }

    #[tokio::test]
    async fn test_blank_polished_text_falls_back_to_raw() {
        let backend = Arc::new(MockBackend::new(Box::new(|_| Ok(" \n ".to_string()))));
        let client = client_with(backend);

        assert_eq!(client.rewrite("  keep me too ").await, "keep me too");
    }

    #[tokio::test]
    async fn test_polished_output_is_trimmed() {
        let backend = Arc::new(MockBackend::new(Box::new(|_| {
            Ok("  Hello world.\n".to_string())
        })));
        let client = client_with(backend);

        assert_eq!(client.rewrite("uh hello world").await, "Hello world.");
    }

    #[tokio::test]
    async fn test_request_shape() {
        let backend = Arc::new(MockBackend::echo());
        let client = client_with(Arc::clone(&backend));

        let out = client.rewrite("  spaced input  ").await;
        assert_eq!(out, "spaced input");

        let request = backend.last_request().unwrap();
        assert_eq!(request.model, "test-model");
        assert!(!request.stream);
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, POLISH_PROMPT);
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.messages[1].content, "spaced input");
    }

    #[test]
    fn test_prompt_covers_rewrite_rules() {
        assert!(POLISH_PROMPT.contains("Filler words"));
        assert!(POLISH_PROMPT.contains("spacing"));
        assert!(POLISH_PROMPT.contains("fluent"));
        assert!(POLISH_PROMPT.contains("meaning"));
        assert!(POLISH_PROMPT.contains("Technical terms"));
        assert!(POLISH_PROMPT.contains("Only the rewritten text"));
    }
}
