//! The external chat-completion capability and its HTTP implementation.

use crate::error::CoreError;
use async_trait::async_trait;
use parley_types::ChatMessage;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default cap on generated tokens per reply (phone replies stay short).
const DEFAULT_MAX_TOKENS: u32 = 150;

/// Fixed sampling temperature for all requests.
const TEMPERATURE: f32 = 0.7;

/// Default end-to-end timeout for one completion request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// External text-generation collaborator.
///
/// The orchestrator only sees this trait, so tests substitute a scripted
/// implementation and deployments can swap backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generates the assistant reply for an ordered message list.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CoreError>;
}

/// Settings for the OpenAI-compatible chat backend.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL of the API, e.g. `https://api.openai.com`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// `CompletionClient` backed by an OpenAI-compatible
/// `/v1/chat/completions` endpoint.
#[derive(Debug)]
pub struct OpenAiChatClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl OpenAiChatClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CoreError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: TEMPERATURE,
        };

        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(model = %self.config.model, message_count = messages.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::Completion(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Completion(format!(
                "completion API returned {status}: {body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Completion(format!("malformed response body: {e}")))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                CoreError::Completion("missing choices[0].message.content in response".to_string())
            })?;

        Ok(content.trim().to_string())
    }
}
