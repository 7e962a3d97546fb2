//! Language-model client seam.
//!
//! `ChatClient` is the only interface the summarizer sees; `OpenAiClient`
//! implements it over the chat-completions HTTP API with a per-call timeout
//! and bounded retry with exponential backoff.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{DigestError, Result};

/// One role-tagged message in a chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Generated text plus the token usage reported for the call.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A chat-capable language-model service.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Model identifier used for token estimation and pricing.
    fn model(&self) -> &str;

    /// Run one chat call. Implementations own their retry policy; an error
    /// here means the call is not recoverable.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion>;
}

/// Retry policy for one logical chat call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Chat-completions client with bounded retry.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryConfig,
}

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

impl OpenAiClient {
    pub fn new(api_key: String, model: String, temperature: f32) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(DigestError::Config("no API key provided".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            model,
            temperature,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    async fn try_chat(&self, messages: &[ChatMessage]) -> std::result::Result<ChatCompletion, ChatAttemptError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatAttemptError::retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let msg = format!("HTTP {}: {}", status, body);
            // 429 and server errors are worth retrying; other client errors
            // (bad key, malformed request) will not get better.
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(ChatAttemptError::retryable(msg));
            }
            return Err(ChatAttemptError::fatal(msg));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatAttemptError::retryable(format!("bad response body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatAttemptError::fatal("response contained no content".to_string()))?;

        Ok(ChatCompletion {
            content,
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
        })
    }
}

struct ChatAttemptError {
    message: String,
    retryable: bool,
}

impl ChatAttemptError {
    fn retryable(message: String) -> Self {
        Self { message, retryable: true }
    }

    fn fatal(message: String) -> Self {
        Self { message, retryable: false }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: self.retry.initial_delay,
            initial_interval: self.retry.initial_delay,
            max_interval: self.retry.max_delay,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = String::new();

        for attempt in 0..=self.retry.max_retries {
            match self.try_chat(messages).await {
                Ok(completion) => {
                    debug!(
                        "Chat call succeeded ({} prompt / {} completion tokens)",
                        completion.prompt_tokens, completion.completion_tokens
                    );
                    return Ok(completion);
                }
                Err(e) if !e.retryable => {
                    return Err(DigestError::Llm(e.message));
                }
                Err(e) => {
                    last_error = e.message;
                    if attempt < self.retry.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "Chat attempt {} failed ({}), retrying in {:?}",
                                attempt + 1,
                                last_error,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(DigestError::Llm(format!(
            "chat call failed after {} attempts: {}",
            self.retry.max_retries + 1,
            last_error
        )))
    }
}
