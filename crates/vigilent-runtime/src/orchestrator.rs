//! Analysis orchestrator: the per-contract pipeline.
//!
//! ```text
//! validate -> rules -> escalation check -+-> rules only
//!                                        +-> cache lookup -+-> hit: merge
//!                                                          +-> miss: model call -+-> ok: cache write, merge
//!                                                                                +-> failed: rules only
//! ```
//!
//! Rules always run and their result is the floor: nothing downstream can
//! make an analysis fail except invalid input or a broken invariant.

use std::sync::Arc;
use thiserror::Error;

use vigilent_core::{
    AnalysisResult, ContractFacts, ContractHash, EscalationPolicy, FactsError,
    InvariantViolation, Merger, ModelRun, RuleAnalysis, RuleEngine,
};

use crate::analyzer::{AnalysisRequest, BuyerHistory, LlmAnalyzer, SimilarContract};
use crate::cache::AnalysisCache;
use crate::config::{ConfigError, RuntimeConfig};
use crate::providers::LlmProvider;
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage};
use crate::store::{MemoryStore, RecordStore};

/// Errors from the analysis pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid contract facts: {0}")]
    InvalidFacts(#[from] FactsError),

    #[error("Invariant violated while merging: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// `Some(false)` never calls the model, `Some(true)` always does,
    /// `None` follows the escalation policy
    pub force_ai: Option<bool>,

    /// Skip the cache read. The result is still written.
    pub bypass_cache: bool,

    pub similar_contracts: Option<Vec<SimilarContract>>,

    pub buyer_history: Option<BuyerHistory>,
}

impl AnalyzeOptions {
    pub fn rules_only() -> Self {
        Self {
            force_ai: Some(false),
            ..Default::default()
        }
    }

    pub fn forced() -> Self {
        Self {
            force_ai: Some(true),
            ..Default::default()
        }
    }
}

/// Runs rules, escalation, cache and model for one contract at a time.
///
/// Safe to share across tasks; the record store is the only shared state
/// that outlives the process.
pub struct AnalysisOrchestrator {
    rules: RuleEngine,
    policy: EscalationPolicy,
    merger: Merger,

    /// `None` when no provider is configured; escalations then stay rules-only
    analyzer: Option<LlmAnalyzer>,

    cache: AnalysisCache,
    circuit_breaker: CircuitBreaker,
    budget_tracker: BudgetTracker,
    config: RuntimeConfig,
}

impl AnalysisOrchestrator {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        store: Arc<dyn RecordStore>,
        config: RuntimeConfig,
    ) -> Self {
        let analyzer = provider.map(|p| LlmAnalyzer::new(p, config.completion_config()));
        let rules = RuleEngine::new();
        let cache = AnalysisCache::new(store, config.store_timeout);

        tracing::debug!(
            rules = ?rules.rule_names(),
            provider = analyzer.as_ref().map(LlmAnalyzer::provider_name),
            model = analyzer.as_ref().map(LlmAnalyzer::model),
            store = cache.store_name(),
            "Analysis orchestrator ready"
        );

        Self {
            rules,
            policy: EscalationPolicy::new(),
            merger: Merger::new(),
            analyzer,
            cache,
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            budget_tracker: BudgetTracker::new(config.token_budget),
            config,
        }
    }

    /// Analyze one contract.
    pub async fn analyze(
        &self,
        facts: &ContractFacts,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult, AnalysisError> {
        facts.validate()?;
        let contract_id = facts.contract_id.as_str();

        let rule_analysis = self.rules.evaluate(facts);
        tracing::debug!(
            contract_id,
            score = rule_analysis.risk_score.value(),
            flags = rule_analysis.red_flags.len(),
            "Rules evaluated"
        );

        let reasons = self.policy.reasons(facts, rule_analysis.risk_score);
        let escalate = match options.force_ai {
            Some(forced) => forced,
            None => !reasons.is_empty(),
        };
        if !escalate {
            tracing::debug!(contract_id, forced = ?options.force_ai, "Escalation skipped");
            return Ok(AnalysisResult::rules_only(rule_analysis));
        }
        tracing::debug!(contract_id, reasons = ?reasons, "Escalating to model analysis");

        let hash = AnalysisCache::hash(facts);
        if options.bypass_cache {
            tracing::debug!(contract_id, hash = hash.short(), "Cache lookup bypassed");
        } else if let Some(cached) = self.cache.get(&hash).await {
            self.budget_tracker.record_cache_hit();
            tracing::info!(contract_id, hash = hash.short(), "Using cached model analysis");
            let run = ModelRun {
                model: cached.entry.model_used,
                tokens_used: 0,
                from_cache: true,
            };
            return Ok(self.merger.merge(&rule_analysis, &cached.analysis, run)?);
        }

        let Some(analyzer) = &self.analyzer else {
            tracing::warn!(contract_id, "No model provider configured, using rules only");
            return Ok(AnalysisResult::rules_only(rule_analysis));
        };
        self.call_model(analyzer, facts, options, &hash, rule_analysis)
            .await
    }

    async fn call_model(
        &self,
        analyzer: &LlmAnalyzer,
        facts: &ContractFacts,
        options: &AnalyzeOptions,
        hash: &ContractHash,
        rule_analysis: RuleAnalysis,
    ) -> Result<AnalysisResult, AnalysisError> {
        let contract_id = facts.contract_id.as_str();
        let model = analyzer.model();

        if self.circuit_breaker.is_open(model) {
            tracing::warn!(contract_id, model, "Circuit open, using rules only");
            return Ok(AnalysisResult::rules_only(rule_analysis));
        }

        let request = AnalysisRequest::new(facts)
            .with_similar_contracts(options.similar_contracts.clone())
            .with_buyer_history(options.buyer_history.clone());

        let estimated = analyzer.estimate_tokens(&request);
        if !self.budget_tracker.can_afford(estimated) {
            tracing::warn!(
                contract_id,
                estimated,
                remaining = ?self.budget_tracker.remaining(),
                "Token budget exhausted, using rules only"
            );
            return Ok(AnalysisResult::rules_only(rule_analysis));
        }

        let outcome = analyzer.analyze(&request).await;
        if outcome.tokens_used > 0 {
            self.budget_tracker.record_usage(&outcome.usage, &outcome.model);
        }

        let Some(ai) = outcome.response else {
            self.circuit_breaker.record_failure(model);
            tracing::warn!(contract_id, model, "Model analysis unavailable, using rules only");
            return Ok(AnalysisResult::rules_only(rule_analysis));
        };
        self.circuit_breaker.record_success(model);

        self.cache
            .put(hash, &ai, &outcome.model, outcome.tokens_used)
            .await;

        let run = ModelRun {
            model: outcome.model,
            tokens_used: outcome.tokens_used,
            from_cache: false,
        };
        let result = self.merger.merge(&rule_analysis, &ai, run)?;
        tracing::info!(
            contract_id,
            rule_score = rule_analysis.risk_score.value(),
            ai_score = ai.risk_score,
            final_score = result.risk_score.value(),
            tokens_used = outcome.tokens_used,
            "Model analysis merged"
        );
        Ok(result)
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Whether a model provider is configured.
    pub fn has_provider(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Usage accumulated since construction.
    pub fn usage(&self) -> LlmUsage {
        self.budget_tracker.get_usage()
    }
}

/// Builder for [`AnalysisOrchestrator`].
pub struct AnalysisOrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    store: Option<Arc<dyn RecordStore>>,
    config: RuntimeConfig,
}

impl AnalysisOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            store: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Record store for the analysis cache. Defaults to a [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the config and build the orchestrator.
    pub fn build(self) -> Result<AnalysisOrchestrator, AnalysisError> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new(self.config.memory_capacity)));

        Ok(AnalysisOrchestrator::new(self.provider, store, self.config))
    }
}

impl Default for AnalysisOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
