// src/llm/registry.rs

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use super::{ChatBackend, LlmError, OllamaClient, OpenAiClient};
use crate::config::Config;

/// `provider:model`, split on the first colon so Ollama tags such as
/// `ollama:llama3:8b` keep their own colon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl FromStr for ModelRef {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s
            .split_once(':')
            .ok_or_else(|| LlmError::InvalidModel(format!("'{}' is not provider:model", s)))?;
        let (provider, model) = (provider.trim(), model.trim());
        if provider.is_empty() || model.is_empty() {
            return Err(LlmError::InvalidModel(format!("'{}' is not provider:model", s)));
        }
        Ok(Self::new(provider.to_ascii_lowercase(), model))
    }
}

impl TryFrom<String> for ModelRef {
    type Error = LlmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelRef> for String {
    fn from(value: ModelRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Chat backends keyed by provider name.
#[derive(Default, Clone)]
pub struct LlmRegistry {
    backends: HashMap<String, Arc<dyn ChatBackend>>,
}

impl LlmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `backend` under its own provider name, replacing any previous one.
    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.insert(backend.provider().to_string(), backend);
        self
    }

    /// Ollama (shared with the health check), OpenAI and Mistral.
    pub fn from_config(config: &Config, ollama: Arc<OllamaClient>) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.llm_request_timeout_secs);

        let openai = OpenAiClient::new(
            "openai",
            &config.openai_base_url,
            config.openai_api_key.clone(),
            timeout,
        )?;
        let mistral = OpenAiClient::new(
            "mistral",
            &config.mistral_base_url,
            config.mistral_api_key.clone(),
            timeout,
        )?;

        Ok(Self::new()
            .with_backend(ollama)
            .with_backend(Arc::new(openai))
            .with_backend(Arc::new(mistral)))
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ChatBackend>> {
        self.backends.get(provider).cloned()
    }

    pub fn resolve(&self, model: &ModelRef) -> Result<Arc<dyn ChatBackend>, LlmError> {
        self.get(&model.provider)
            .ok_or_else(|| LlmError::NotConfigured(format!("unknown provider '{}'", model.provider)))
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_ref_splits_on_first_colon() {
        let r: ModelRef = "ollama:llama3:8b".parse().unwrap();
        assert_eq!(r.provider, "ollama");
        assert_eq!(r.model, "llama3:8b");
        assert_eq!(r.to_string(), "ollama:llama3:8b");
    }

    #[test]
    fn model_ref_rejects_missing_parts() {
        assert!("gpt-4o".parse::<ModelRef>().is_err());
        assert!(":gpt-4o".parse::<ModelRef>().is_err());
        assert!("openai:".parse::<ModelRef>().is_err());
    }

    #[test]
    fn model_ref_serde_uses_string_form() {
        let r: ModelRef = serde_json::from_str(r#""OpenAI:gpt-4o-mini""#).unwrap();
        assert_eq!(r, ModelRef::new("openai", "gpt-4o-mini"));
        assert_eq!(serde_json::to_string(&r).unwrap(), r#""openai:gpt-4o-mini""#);
        assert!(serde_json::from_str::<ModelRef>(r#""nocolon""#).is_err());
    }

    #[test]
    fn resolve_unknown_provider() {
        let registry = LlmRegistry::new();
        let err = registry
            .resolve(&ModelRef::new("anthropic", "x"))
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
