use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    llm::{LlmRegistry, OllamaClient},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub llm: Arc<LlmRegistry>,
    /// Also registered in `llm`; kept typed for the version check.
    pub ollama: Arc<OllamaClient>,
}

impl AppState {
    /// Builds the LLM clients described by `config`.
    pub fn new(pool: SqlitePool, config: Config) -> Result<Self, AppError> {
        let ollama = Arc::new(OllamaClient::new(
            &config.ollama_base_url,
            Duration::from_secs(config.llm_request_timeout_secs),
        )?);
        let llm = Arc::new(LlmRegistry::from_config(&config, ollama.clone())?);

        Ok(Self {
            pool,
            config,
            llm,
            ollama,
        })
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<LlmRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.llm.clone()
    }
}

impl FromRef<AppState> for Arc<OllamaClient> {
    fn from_ref(state: &AppState) -> Self {
        state.ollama.clone()
    }
}
