// src/llm/ollama.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChatBackend, ChatMessage, ChatOptions, Completion, LlmError, check_status};

/// Client for a local Ollama daemon.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: ChatResponseMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    /// `request_timeout` bounds every call except the health check, which
    /// passes its own.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/version`. Any non-2xx answer is an error.
    pub async fn version(&self, timeout: Duration) -> Result<String, LlmError> {
        let response = self
            .http
            .get(format!("{}/api/version", self.base_url))
            .timeout(timeout)
            .send()
            .await?;
        let body: VersionResponse = check_status(response).await?.json().await?;
        Ok(body.version)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        let body: TagsResponse = check_status(response).await?.json().await?;

        let mut names: Vec<String> = body.models.into_iter().map(|m| m.name).collect();
        names.sort();
        Ok(names)
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, LlmError> {
        let mut model_options = serde_json::Map::new();
        if let Some(temperature) = options.temperature {
            model_options.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = options.max_tokens {
            model_options.insert("num_predict".into(), json!(max_tokens));
        }

        let body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": model_options,
        });

        tracing::debug!(model, messages = messages.len(), "ollama chat");

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let reply: ChatResponse = check_status(response).await?.json().await?;

        Ok(Completion {
            model: reply.model.unwrap_or_else(|| model.to_string()),
            content: reply.message.content,
            prompt_tokens: reply.prompt_eval_count,
            completion_tokens: reply.eval_count,
        })
    }
}
