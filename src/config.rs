// src/config.rs

use std::{env, fmt, str::FromStr};

use thiserror::Error;
use url::Url;

/// Startup configuration problems. The binary refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub log_dir: String,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,

    pub ollama_base_url: String,
    pub ollama_health_timeout_ms: u64,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub mistral_api_key: Option<String>,
    pub mistral_base_url: String,
    pub llm_request_timeout_secs: u64,

    pub signup_credits: i64,
    pub chat_credit_cost: i64,
    pub roundrobin_turn_cost: i64,
    pub roundrobin_context_chars: usize,
    pub roundrobin_attempt_timeout_secs: u64,
}

impl Config {
    /// Reads the process environment. `main` loads `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let cors_origins = optional("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            database_url: or_default("DATABASE_URL", "sqlite://nucleus.db"),
            jwt_secret,
            jwt_expiration: parsed("JWT_EXPIRATION", 86_400)?,
            rust_log: or_default("RUST_LOG", "info"),
            log_dir: or_default("LOG_DIR", "logs"),
            bind_addr: or_default("BIND_ADDR", "0.0.0.0:3000"),
            cors_origins,
            admin_username: optional("ADMIN_USERNAME"),
            admin_password: optional("ADMIN_PASSWORD"),

            ollama_base_url: base_url("OLLAMA_BASE_URL", "http://localhost:11434")?,
            ollama_health_timeout_ms: parsed("OLLAMA_HEALTH_TIMEOUT_MS", 1500)?,
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_base_url: base_url("OPENAI_BASE_URL", "https://api.openai.com/v1")?,
            mistral_api_key: optional("MISTRAL_API_KEY"),
            mistral_base_url: base_url("MISTRAL_BASE_URL", "https://api.mistral.ai/v1")?,
            llm_request_timeout_secs: parsed("LLM_REQUEST_TIMEOUT_SECS", 120)?,

            signup_credits: parsed("SIGNUP_CREDITS", 50)?,
            chat_credit_cost: parsed("CHAT_CREDIT_COST", 1)?,
            roundrobin_turn_cost: parsed("ROUNDROBIN_TURN_COST", 1)?,
            roundrobin_context_chars: parsed("ROUNDROBIN_CONTEXT_CHARS", 12_000)?,
            roundrobin_attempt_timeout_secs: parsed("ROUNDROBIN_ATTEMPT_TIMEOUT_SECS", 60)?,
        })
    }
}

/// Empty values count as unset.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Validates an HTTP(S) base URL and strips the trailing slash.
fn base_url(key: &'static str, default: &str) -> Result<String, ConfigError> {
    let raw = or_default(key, default);
    validate_base_url(&raw).map_err(|reason| ConfigError::Invalid { key, reason })
}

pub fn validate_base_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_trailing_slash() {
        assert_eq!(
            validate_base_url("http://localhost:11434/").unwrap(),
            "http://localhost:11434"
        );
        assert_eq!(
            validate_base_url("https://api.openai.com/v1").unwrap(),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn base_url_rejects_garbage_and_other_schemes() {
        assert!(validate_base_url("not a url").is_err());
        assert!(validate_base_url("ftp://example.com").is_err());
    }

    #[test]
    fn errors_name_the_variable() {
        assert_eq!(
            ConfigError::Missing("JWT_SECRET").to_string(),
            "JWT_SECRET must be set"
        );

        let fallback = parsed::<u64>("NUCLEUS_TEST_UNSET_NUMBER", 7).unwrap();
        assert_eq!(fallback, 7);

        let err = base_url("NUCLEUS_TEST_UNSET_URL", "ftp://example.com").unwrap_err();
        assert_eq!(
            err.to_string(),
            "NUCLEUS_TEST_UNSET_URL is invalid: unsupported scheme 'ftp'"
        );
    }
}
