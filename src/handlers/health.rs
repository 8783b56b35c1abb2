// src/handlers/health.rs

use std::{sync::Arc, time::Duration};

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{config::Config, llm::OllamaClient, models::chat::OllamaHealth};

/// Liveness plus a database ping. Always 200.
pub async fn health(State(pool): State<SqlitePool>) -> impl IntoResponse {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&pool)
        .await
        .is_ok();

    Json(json!({ "status": "ok", "database": database }))
}

/// Checks the Ollama daemon's version endpoint.
/// Always 200: an unreachable, slow or failing daemon is just `online: false`.
pub async fn ollama_health(
    State(ollama): State<Arc<OllamaClient>>,
    State(config): State<Config>,
) -> impl IntoResponse {
    let timeout = Duration::from_millis(config.ollama_health_timeout_ms);

    let version = match ollama.version(timeout).await {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::debug!("Ollama at {} is offline: {}", ollama.base_url(), e);
            None
        }
    };

    Json(OllamaHealth {
        online: version.is_some(),
        base_url: ollama.base_url().to_string(),
        version,
    })
}
