//! Chat completion backends.
//!
//! `OpenAiBackend` talks to any OpenAI-compatible endpoint over HTTP.
//! `MockBackend` is closure-driven and records every request, for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use voicepolish_core::config::LlmConfig;

use crate::error::RewriteError;
use crate::types::{ChatRequest, ChatResponse};

/// A service that answers a single chat completion request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `request` and return the content of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, RewriteError>;
}

/// HTTP backend for `POST {api_base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Build a backend from the `[llm]` configuration section.
    pub fn new(config: &LlmConfig) -> Result<Self, RewriteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: completions_url(&config.api_base),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, RewriteError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RewriteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| RewriteError::Decode(e.to_string()))?;

        parsed
            .first_content()
            .map(str::to_string)
            .ok_or(RewriteError::EmptyResponse)
    }
}

fn completions_url(api_base: &str) -> String {
    format!("{}/chat/completions", api_base.trim_end_matches('/'))
}

/// Handler signature used by [`MockBackend`].
pub type MockFn = Box<dyn Fn(&ChatRequest) -> Result<String, RewriteError> + Send + Sync>;

/// In-memory backend that delegates to a closure and records requests.
pub struct MockBackend {
    handler: MockFn,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl MockBackend {
    pub fn new(handler: MockFn) -> Self {
        Self {
            handler,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Returns the user message unchanged.
    pub fn echo() -> Self {
        Self::new(Box::new(|request| {
            Ok(request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }))
    }

    /// Fails every call as an unreachable service would.
    pub fn failing() -> Self {
        Self::new(Box::new(|_| {
            Err(RewriteError::Status {
                status: 503,
                body: "service unavailable".into(),
            })
        }))
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, RewriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
        (self.handler)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user(text)],
            temperature: 0.3,
            stream: false,
        }
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            completions_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:8080/v1/"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_openai_backend_endpoint_from_config() {
        let config = LlmConfig {
            api_key: "sk".into(),
            api_base: "https://llm.example.com/v1/".into(),
            model: "m".into(),
            ..LlmConfig::default()
        };
        let backend = OpenAiBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint(), "https://llm.example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_mock_echo_records_request() {
        let backend = MockBackend::echo();
        let out = backend.complete(&request("hello")).await.unwrap();

        assert_eq!(out, "hello");
        assert_eq!(backend.calls(), 1);
        let last = backend.last_request().unwrap();
        assert_eq!(last.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let backend = MockBackend::failing();
        let err = backend.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, RewriteError::Status { status: 503, .. }));
        assert_eq!(backend.calls(), 1);
    }
}
