//! Runtime configuration: optional TOML file, environment API keys, CLI overrides.
//!
//! ```toml
//! provider = "anthropic"
//! model = "claude-3-5-haiku-latest"
//! default_language = "Spanish"
//! request_timeout_secs = 20
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{ChatError, Result};
use crate::gateway::LlmGateway;
use crate::languages::DEFAULT_TARGET_LANGUAGE;
use crate::providers::Provider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub provider: Provider,
    /// Provider default when absent.
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub default_language: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub channel_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            provider: Provider::default(),
            model: None,
            base_url: None,
            default_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ChatConfig {
    /// Defaults, overlaid with `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| ChatError::Config(format!("cannot read {}: {}", p.display(), e)))?;
                Self::from_toml_str(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ChatError::Config(format!("invalid config: {}", e)))
    }

    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Read the provider's API key from the environment.
    pub fn api_key(&self) -> Result<String> {
        let var = self.provider.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ChatError::Config(format!("{} not set. Export it or pass via environment.", var))),
        }
    }

    /// Build the LLM gateway described by this config.
    pub fn gateway(&self) -> Result<LlmGateway> {
        let mut builder = LlmGateway::builder(self.provider)
            .api_key(self.api_key()?)
            .model(self.model())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .request_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.clone());
        }
        Ok(builder.build())
    }
}
