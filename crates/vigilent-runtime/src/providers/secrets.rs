//! Credential handling for LLM providers.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read, so
//! they never show up in `Debug` or `Display` output and are zeroed on drop.
//!
//! ```ignore
//! let cred = ApiCredential::from_config_or_env(
//!     &settings,
//!     "api_key",
//!     "OPENROUTER_API_KEY",
//!     "OpenRouter API key",
//! )?;
//! request.bearer_auth(cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Provider settings in the runtime config
    Config,
    Environment,
    /// Passed in by the caller
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A redacted API credential.
///
/// The value is only reachable through [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable. Blank counts as unset.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        env_value(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("{name} not set: export {env_var}"))
            })
    }

    /// Load from provider settings, falling back to an environment variable.
    ///
    /// Settings win over the environment. Blank values count as unset.
    pub fn from_config_or_env(
        settings: &JsonValue,
        key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = settings_value(settings, key) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }
        Self::from_env(env_var, name).map_err(|_| {
            ProviderError::NotConfigured(format!(
                "{name} required: set '{key}' in provider settings or export {env_var}"
            ))
        })
    }

    /// Whether either source holds a non-blank value.
    pub fn is_available(settings: &JsonValue, key: &str, env_var: &str) -> bool {
        settings_value(settings, key).is_some() || env_value(env_var).is_some()
    }

    /// Expose the value at the point of use (e.g. an auth header).
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn settings_value<'a>(settings: &'a JsonValue, key: &str) -> Option<&'a str> {
    settings[key].as_str().filter(|v| !v.trim().is_empty())
}

fn env_value(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
