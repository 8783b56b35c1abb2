// src/models/chat.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::llm::{ChatMessage, ChatOptions, Completion};

/// DTO for a single chat completion through one of the proxies.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    /// `provider:model` for billed chat, a bare Ollama model name for the local proxy.
    #[validate(length(min = 1, max = 200))]
    pub model: String,

    #[validate(length(min = 1, max = 200, message = "Between 1 and 200 messages are allowed"))]
    pub messages: Vec<ChatMessage>,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[validate(range(min = 1, max = 32768))]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BilledChatResponse {
    pub completion: Completion,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaHealth {
    pub online: bool,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
