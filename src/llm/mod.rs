// src/llm/mod.rs

//! Chat backends: a single trait over Ollama and OpenAI-compatible APIs,
//! plus the registry that resolves `provider:model` references to them.

pub mod ollama;
pub mod openai;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use registry::{LlmRegistry, ModelRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A finished, non-streamed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub model: String,
    pub content: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// Provider unknown or missing credentials.
    #[error("not configured: {0}")]
    NotConfigured(String),
    /// Malformed `provider:model` reference.
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("request timed out")]
    Timeout,
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Whether trying the same request again might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::Unreachable(_) => true,
            LlmError::Upstream { status, .. } => *status == 429 || *status >= 500,
            LlmError::NotConfigured(_) | LlmError::InvalidModel(_) | LlmError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            LlmError::Upstream {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            LlmError::Unreachable(err.to_string())
        }
    }
}

/// Turns a non-2xx response into `LlmError::Upstream`, keeping a short body excerpt.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(300).collect();
    Err(LlmError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Registry key, e.g. `ollama` or `openai`.
    fn provider(&self) -> &str;

    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, LlmError>;
}
