//! Language-model collaborator.

use crate::errors::CollaboratorError;
use crate::pipeline::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions.
    System,
    /// The request.
    User,
    /// A previous model answer.
    Assistant,
}

/// One message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A chat-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends the conversation and returns the answer text.
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, CollaboratorError>;

    /// Returns false when the model cannot be called at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Settings for [`OpenAiChatModel`].
#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    /// API base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Bearer token.
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryConfig,
}

/// An OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    http: reqwest::Client,
    config: ChatModelConfig,
}

impl OpenAiChatModel {
    /// Creates a client.
    pub fn new(config: ChatModelConfig) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn complete_once(&self, messages: &[ChatMessage]) -> Result<String, CollaboratorError> {
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = resp.json().await?;
        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::Decode("completion has no message content".into()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, CollaboratorError> {
        debug!(model = %self.config.model, messages = messages.len(), "Invoking model");
        with_retry_if(
            &self.config.retry,
            &self.config.model,
            || self.complete_once(messages),
            CollaboratorError::is_retryable,
        )
        .await
    }

    fn describe(&self) -> String {
        format!("{} at {}", self.config.model, self.config.base_url)
    }
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Clone)]
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    /// Creates the stand-in with the reason it is unavailable.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for UnavailableModel {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(format!(
            "language model ({})",
            self.reason
        )))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("unavailable: {}", self.reason)
    }
}
