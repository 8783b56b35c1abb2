// src/handlers/providers.rs

use std::{collections::BTreeMap, sync::Arc};

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use tokio::task::JoinSet;
use validator::Validate;

use crate::{
    error::AppError,
    llm::{ChatBackend, LlmRegistry, OllamaClient},
    models::chat::{ChatRequest, ModelListResponse},
};

/// Model ids from one provider; any failure is logged and becomes an empty list.
async fn models_or_empty(registry: &LlmRegistry, provider: &str) -> Vec<String> {
    let Some(backend) = registry.get(provider) else {
        return Vec::new();
    };

    match backend.list_models().await {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!("Listing {} models failed: {}", provider, e);
            Vec::new()
        }
    }
}

/// `{models: [...]}` from OpenAI. Never fails.
pub async fn openai_models(State(registry): State<Arc<LlmRegistry>>) -> impl IntoResponse {
    Json(ModelListResponse {
        models: models_or_empty(&registry, "openai").await,
    })
}

/// `{models: [...]}` from the local Ollama daemon. Never fails.
pub async fn ollama_models(State(registry): State<Arc<LlmRegistry>>) -> impl IntoResponse {
    Json(ModelListResponse {
        models: models_or_empty(&registry, "ollama").await,
    })
}

/// Every registered provider, queried concurrently.
pub async fn all_models(State(registry): State<Arc<LlmRegistry>>) -> impl IntoResponse {
    let mut tasks = JoinSet::new();
    for provider in registry.providers() {
        let registry = registry.clone();
        tasks.spawn(async move {
            let models = models_or_empty(&registry, &provider).await;
            (provider, models)
        });
    }

    let mut providers = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((provider, models)) => {
                providers.insert(provider, models);
            }
            Err(e) => tracing::error!("Model listing task failed: {}", e),
        }
    }

    Json(json!({ "providers": providers }))
}

/// Unbilled pass-through to the local Ollama daemon. `model` is a bare Ollama tag.
pub async fn ollama_chat(
    State(ollama): State<Arc<OllamaClient>>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let completion = ollama
        .chat(&payload.model, &payload.messages, &payload.options())
        .await?;

    Ok(Json(completion))
}
