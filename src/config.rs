//! Configuration management for the run engine server.
//!
//! Configuration is set via environment variables:
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` / `GOOGLE_API_KEY` - Provider keys.
//!   At least one is required; a provider without a key is unavailable.
//! - `DEFAULT_PROVIDER` - Optional. `openai`, `anthropic` or `google`. Defaults to `openai`.
//! - `DEFAULT_MODEL` - Optional. Model used when a run does not name one. Defaults to `gpt-4o`.
//! - `TITLE_MODEL` - Optional. Cheap model for project title generation. Defaults to `gpt-4o-mini`.
//! - `RUN_STORE` - Optional. `memory`, `file` or `sqlite`. Defaults to `sqlite`.
//! - `DATA_DIR` - Optional. Base directory for persistent stores. Defaults to `./data`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::types::Provider;
use crate::store::RunStoreType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Provider used when a run does not name one
    pub default_provider: Provider,

    /// Model used when a run does not name one
    pub default_model: String,

    /// Cheap model used for project title generation
    pub title_model: String,

    /// Which run store backend to use
    pub store_type: RunStoreType,

    /// Base directory for persistent stores
    pub data_dir: PathBuf,

    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no provider key is set, and
    /// `ConfigError::InvalidValue` when the default provider has no key or a
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = optional_env("OPENAI_API_KEY");
        let anthropic_api_key = optional_env("ANTHROPIC_API_KEY");
        let google_api_key = optional_env("GOOGLE_API_KEY");

        if openai_api_key.is_none() && anthropic_api_key.is_none() && google_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "OPENAI_API_KEY, ANTHROPIC_API_KEY or GOOGLE_API_KEY".to_string(),
            ));
        }

        let default_provider = match std::env::var("DEFAULT_PROVIDER") {
            Ok(value) => match value.to_lowercase().as_str() {
                "openai" => Provider::OpenAi,
                "anthropic" => Provider::Anthropic,
                "google" => Provider::Google,
                other => {
                    return Err(ConfigError::InvalidValue(
                        "DEFAULT_PROVIDER".to_string(),
                        format!("unknown provider '{}'", other),
                    ));
                }
            },
            Err(_) => Provider::OpenAi,
        };

        let has_default_key = match default_provider {
            Provider::OpenAi => openai_api_key.is_some(),
            Provider::Anthropic => anthropic_api_key.is_some(),
            Provider::Google => google_api_key.is_some(),
        };
        if !has_default_key {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_PROVIDER".to_string(),
                format!("no API key configured for {}", default_provider),
            ));
        }

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let title_model =
            std::env::var("TITLE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let store_type = std::env::var("RUN_STORE")
            .map(|s| RunStoreType::from_str(&s))
            .unwrap_or_default();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        Ok(Self {
            host,
            port,
            default_provider,
            default_model,
            title_model,
            store_type,
            data_dir,
            openai_api_key,
            anthropic_api_key,
            google_api_key,
        })
    }

    /// API key for a provider, if configured.
    pub fn api_key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Google => self.google_api_key.as_deref(),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
