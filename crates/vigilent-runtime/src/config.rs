//! Runtime configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid config. Durations use human-readable strings ("30s", "2m").
//!
//! ```yaml
//! provider:
//!   type: openrouter
//!   settings:
//!     referer: https://vigilent.example.org
//! model: deepseek/deepseek-chat
//! llm_timeout: 45s
//! store_timeout: 2s
//! batch_concurrency: 8
//! token_budget: 2000000
//! circuit_breaker:
//!   failure_threshold: 5
//!   recovery_timeout: 1m
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;
use crate::resilience::CircuitBreakerConfig;

/// Model used when the config names none.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1500;
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;
pub const DEFAULT_MEMORY_CAPACITY: u64 = 100_000;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which provider to build and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,

    /// Provider-specific settings, passed to its factory
    #[serde(default = "empty_settings")]
    pub settings: JsonValue,
}

fn empty_settings() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "openrouter".to_string(),
            settings: empty_settings(),
        }
    }
}

/// Configuration for the analysis runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderConfig,

    pub model: String,

    pub temperature: f32,

    /// Maximum output tokens per model call
    pub max_tokens: u32,

    /// Upper bound on one model call
    #[serde(with = "humantime_duration")]
    pub llm_timeout: Duration,

    /// Upper bound on one record store call
    #[serde(with = "humantime_duration")]
    pub store_timeout: Duration,

    /// Contracts analyzed at once in a batch
    pub batch_concurrency: usize,

    /// Capacity of the in-memory record store
    pub memory_capacity: u64,

    pub circuit_breaker: CircuitBreakerConfig,

    /// Total tokens this process may spend; unlimited when absent
    pub token_budget: Option<u32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            circuit_breaker: CircuitBreakerConfig::default(),
            token_budget: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = if yaml.trim().is_empty() {
            RuntimeConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.llm_timeout.is_zero() || self.store_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Completion settings for one analysis call.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.llm_timeout,
            json_response: true,
        }
    }
}

/// Serde adapter for durations written as "30s", "1m 30s", ...
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
