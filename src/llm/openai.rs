// src/llm/openai.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChatBackend, ChatMessage, ChatOptions, Completion, LlmError, check_status};

/// Client for OpenAI-compatible APIs (`/models`, `/chat/completions`).
/// Registered once for OpenAI and once for Mistral.
pub struct OpenAiClient {
    http: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl OpenAiClient {
    pub fn new(
        provider: &str,
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http,
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured(format!("{} API key is not set", self.provider)))
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let key = self.api_key()?;
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(key)
            .send()
            .await?;
        let list: ModelList = check_status(response).await?.json().await?;

        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Completion, LlmError> {
        let key = self.api_key()?;

        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        tracing::debug!(provider = %self.provider, model, messages = messages.len(), "chat completion");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let reply: ChatCompletionResponse = check_status(response).await?.json().await?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))?;

        let (prompt_tokens, completion_tokens) = reply
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((None, None));

        Ok(Completion {
            model: reply.model.unwrap_or_else(|| model.to_string()),
            content,
            prompt_tokens,
            completion_tokens,
        })
    }
}
