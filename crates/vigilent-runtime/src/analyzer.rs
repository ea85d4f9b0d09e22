//! LLM analyzer: one model call per contract, structured response.
//!
//! The analyzer never fails. Missing credentials, transport errors,
//! timeouts and unusable responses all come back as an outcome without a
//! response, and the caller falls back to rules.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use vigilent_core::{ContractFacts, StructuredAnalysis};

use crate::prompts::SYSTEM_PROMPT;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, TokenUsage};

lazy_static! {
    /// Markdown code fences some models wrap around JSON despite instructions.
    static ref CODE_FENCE: Regex = Regex::new(r"(?i)```(?:json)?[ \t]*\r?\n?").unwrap();
}

/// Contract fields sent to the model. Tax identifiers are never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub contract_id: String,
    pub title: String,
    pub buyer_name: String,
    pub winner_name: Option<String>,
    pub contract_value: Option<f64>,
    pub estimated_value: Option<f64>,
    pub bidder_count: Option<u32>,
    pub procedure_type: Option<String>,
}

impl From<&ContractFacts> for ContractSummary {
    fn from(facts: &ContractFacts) -> Self {
        Self {
            contract_id: facts.contract_id.clone(),
            title: facts.title.clone(),
            buyer_name: facts.buyer_name.clone(),
            winner_name: facts.winner_name.clone(),
            contract_value: facts.contract_value,
            estimated_value: facts.estimated_value,
            bidder_count: facts.bidder_count,
            procedure_type: facts.procedure_type.clone(),
        }
    }
}

/// A comparable contract, for market context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarContract {
    pub contract_value: f64,
    pub bidder_count: u32,
}

/// The buyer's track record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerHistory {
    pub total_contracts: u32,
    pub avg_risk_score: f64,
}

/// Everything the model sees about one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub contract: ContractSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_contracts: Option<Vec<SimilarContract>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_history: Option<BuyerHistory>,
}

impl AnalysisRequest {
    pub fn new(facts: &ContractFacts) -> Self {
        Self {
            contract: ContractSummary::from(facts),
            similar_contracts: None,
            buyer_history: None,
        }
    }

    pub fn with_similar_contracts(mut self, similar: Option<Vec<SimilarContract>>) -> Self {
        self.similar_contracts = similar;
        self
    }

    pub fn with_buyer_history(mut self, history: Option<BuyerHistory>) -> Self {
        self.buyer_history = history;
        self
    }
}

/// Result of one analyzer call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmOutcome {
    /// Validated analysis, `None` on any failure
    pub response: Option<StructuredAnalysis>,

    /// Tokens reported by the provider (also when the response was unusable)
    pub tokens_used: u32,

    pub usage: TokenUsage,

    /// Model that served the call, or the configured model if none did
    pub model: String,
}

impl LlmOutcome {
    fn failed(model: &str) -> Self {
        Self {
            response: None,
            tokens_used: 0,
            usage: TokenUsage::default(),
            model: model.to_string(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.response.is_some()
    }
}

/// Calls a provider with the fixed analysis prompt.
pub struct LlmAnalyzer {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
        }
    }

    pub fn model(&self) -> &str {
        &self.completion.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Upper estimate of the tokens one call for `request` will use.
    pub fn estimate_tokens(&self, request: &AnalysisRequest) -> u32 {
        let prompt = serde_json::to_string_pretty(request).unwrap_or_default();
        self.provider
            .estimate_tokens(SYSTEM_PROMPT)
            .saturating_add(self.provider.estimate_tokens(&prompt))
            .saturating_add(self.completion.max_tokens)
    }

    /// Analyze one contract.
    pub async fn analyze(&self, request: &AnalysisRequest) -> LlmOutcome {
        let model = self.completion.model.as_str();
        let contract_id = request.contract.contract_id.as_str();

        if !self.provider.health_check().await {
            tracing::warn!(
                contract_id,
                provider = self.provider.name(),
                "Provider not configured, skipping model analysis"
            );
            return LlmOutcome::failed(model);
        }

        let user_message = match serde_json::to_string_pretty(request) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(contract_id, error = %e, "Failed to serialize analysis request");
                return LlmOutcome::failed(model);
            }
        };
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_message),
        ];

        let timeout = self.completion.timeout;
        let response = match tokio::time::timeout(
            timeout,
            self.provider.complete(messages, &self.completion),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(contract_id, model, error = %e, "Model call failed");
                return LlmOutcome::failed(model);
            }
            Err(_) => {
                tracing::warn!(contract_id, model, timeout = ?timeout, "Model call timed out");
                return LlmOutcome::failed(model);
            }
        };

        let tokens_used = response.usage.total();
        let cleaned = strip_code_fences(&response.content);
        let parsed = match StructuredAnalysis::parse(cleaned) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::warn!(
                    contract_id,
                    model = %response.model,
                    error = %e,
                    "Model response rejected"
                );
                None
            }
        };

        if parsed.is_some() {
            tracing::info!(
                contract_id,
                model = %response.model,
                tokens_used,
                "Model analysis complete"
            );
        }

        LlmOutcome {
            response: parsed,
            tokens_used,
            usage: response.usage,
            model: response.model,
        }
    }
}

/// Remove markdown code fences and surrounding whitespace.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(open) = CODE_FENCE.find(trimmed).filter(|m| m.start() == 0) else {
        return trimmed;
    };
    let body = &trimmed[open.end()..];
    body.strip_suffix("```").unwrap_or(body).trim()
}
