//! Configuration types for the session core.
//!
//! One [`SessionConfig`] is passed at session construction; engines and
//! backends are selected here, never through process-global state. All
//! sections default sensibly so a missing or partial TOML file still
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::tools::stdio::ToolServerSpec;
use crate::agent::types::AgentConfig;
use crate::error::{AriaError, Result};

/// Top-level configuration for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Model provider settings.
    pub model: ModelConfig,
    /// Orchestrator settings (iteration ceiling, timeouts, rates).
    pub agent: AgentConfig,
    /// External tool servers, in precedence order for duplicate tool
    /// names.
    pub servers: Vec<ToolServerSpec>,
}

/// Model provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible endpoint.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum tokens per response, if bounded.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            max_tokens: None,
            temperature: None,
        }
    }
}

impl ModelConfig {
    /// Read the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the variable when it is unset or
    /// empty.
    pub fn resolve_api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(AriaError::Config(format!(
                "API key environment variable '{}' is not set",
                self.api_key_env
            ))),
        }
    }

    /// Request options derived from this config.
    pub fn request_options(&self) -> crate::agent::provider::RequestOptions {
        let mut options = crate::agent::provider::RequestOptions::new();
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            options = options.with_temperature(temperature);
        }
        options
    }
}

impl SessionConfig {
    /// The default config file path (`~/.config/aria/config.toml`).
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aria")
            .join("config.toml")
    }

    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file is unreadable and a config
    /// error when it fails to parse.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| AriaError::Config(format!("{}: {e}", path.display())))
    }

    /// Load the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the config as TOML, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| AriaError::Config(format!("serialize failed: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
