//! OpenRouter provider (OpenAI-compatible chat completions).
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! bearer header is set. See the [`secrets`](super::secrets) module.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the OpenRouter API key.
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Sent as `HTTP-Referer` unless settings override it.
pub const DEFAULT_REFERER: &str = "http://localhost:3000";

/// Sent as `X-Title` so requests are attributed in OpenRouter's dashboard.
pub const APP_TITLE: &str = "Vigilent - AI Procurement Monitor";

const CREDENTIAL_NAME: &str = "OpenRouter API key";

pub struct OpenRouterProvider {
    credential: ApiCredential,
    base_url: String,
    referer: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("referer", &self.referer)
            .finish()
    }
}

impl OpenRouterProvider {
    /// Create a provider from an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, CREDENTIAL_NAME),
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(OPENROUTER_API_KEY_ENV, CREDENTIAL_NAME)?;
        Self::with_credential(credential, &JsonValue::Null)
    }

    /// Create from provider settings with environment fallback for the key.
    ///
    /// Recognized keys: `api_key`, `base_url`, `referer`.
    pub fn from_config(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            settings,
            "api_key",
            OPENROUTER_API_KEY_ENV,
            CREDENTIAL_NAME,
        )?;
        Self::with_credential(credential, settings)
    }

    fn with_credential(
        credential: ApiCredential,
        settings: &JsonValue,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vigilent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let provider = Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: settings["referer"]
                .as_str()
                .unwrap_or(DEFAULT_REFERER)
                .to_string(),
            client,
        };
        Ok(match settings["base_url"].as_str() {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    error: OpenRouterErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatCompletionRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: config
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", APP_TITLE)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenRouterError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: body.model.unwrap_or_else(|| config.model.clone()),
            finish_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// Factory for OpenRouter providers.
///
/// ## Settings
/// ```json
/// {
///   "api_key": "sk-or-...",          // Optional, falls back to OPENROUTER_API_KEY
///   "base_url": "https://...",        // Optional
///   "referer": "https://example.org"  // Optional, sent as HTTP-Referer
/// }
/// ```
pub struct OpenRouterProviderFactory;

impl ProviderFactory for OpenRouterProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openrouter"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(OpenRouterProvider::from_config(settings)?))
    }

    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(settings, "api_key", OPENROUTER_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "{} required: set 'api_key' in config or {} env",
                CREDENTIAL_NAME, OPENROUTER_API_KEY_ENV
            )));
        }

        if let Some(url) = settings["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "OpenRouter chat completions (OpenAI-compatible)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("{}")];
        let request = ChatCompletionRequest {
            model: "deepseek/deepseek-chat",
            messages: &messages,
            temperature: 0.3,
            max_tokens: 1500,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["max_tokens"], 1500);
    }

    #[test]
    fn test_response_parsing_tolerates_missing_usage() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"id":"gen-1","choices":[{"message":{"role":"assistant","content":"{}"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert!(body.usage.is_none());
        assert_eq!(body.choices[0].message.content.as_deref(), Some("{}"));
    }

    #[test]
    fn test_factory_create_with_api_key() {
        let provider = OpenRouterProviderFactory
            .create(&serde_json::json!({ "api_key": "sk-or-test" }))
            .unwrap();
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn test_settings_override_base_url() {
        let provider = OpenRouterProvider::from_config(&serde_json::json!({
            "api_key": "sk-or-test",
            "base_url": "http://localhost:8080/v1/"
        }))
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");

        let default = OpenRouterProvider::from_config(&serde_json::json!({ "api_key": "sk-or-test" }))
            .unwrap();
        assert_eq!(default.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let result = OpenRouterProviderFactory.validate_config(&serde_json::json!({
            "api_key": "sk-or-test",
            "base_url": "openrouter.ai"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret = "sk-or-v1-very-secret";
        let provider = OpenRouterProvider::new(secret);
        let debug = format!("{:?}", provider);
        assert!(!debug.contains(secret));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_blank_key_fails_health_check() {
        assert!(!OpenRouterProvider::new("   ").health_check().await);
        assert!(OpenRouterProvider::new("sk-or-test").health_check().await);
    }
}
