//! # vigilent-runtime
//!
//! Async analysis runtime for Vigilent.
//!
//! `vigilent-core` scores contracts with deterministic rules. This crate
//! decides when a contract deserves a model analysis, calls the model,
//! caches what it returns and merges it with the rule result.
//!
//! The model is always optional. Every failure on the model path (no key,
//! timeout, malformed response, open circuit, exhausted budget, broken
//! store) degrades to the rules-only result.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigilent_runtime::{AnalysisOrchestratorBuilder, AnalyzeOptions};
//!
//! let orchestrator = AnalysisOrchestratorBuilder::new()
//!     .provider(provider)
//!     .store(store)
//!     .build()?;
//!
//! let result = orchestrator.analyze(&facts, &AnalyzeOptions::default()).await?;
//! println!("{} ({})", result.risk_score, result.analysis_version());
//! ```

pub mod analyzer;
pub mod batch;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod store;

pub use analyzer::{
    strip_code_fences, AnalysisRequest, BuyerHistory, ContractSummary, LlmAnalyzer, LlmOutcome,
    SimilarContract,
};
pub use batch::{analyze_batch, BatchItem, BatchReport, BatchSummary, RecordOutcome};
pub use cache::{
    AnalysisCache, CacheError, CacheLookup, CacheStats, CachedAnalysis, CACHE_TTL_DAYS,
};
pub use config::{ConfigError, ProviderConfig, RuntimeConfig};
pub use orchestrator::{
    AnalysisError, AnalysisOrchestrator, AnalysisOrchestratorBuilder, AnalyzeOptions,
};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider,
    ProviderError, ProviderFactory, ProviderRegistry, TokenUsage,
};
pub use resilience::{BudgetTracker, CircuitBreaker, CircuitBreakerConfig, LlmUsage};
pub use store::{CacheEntry, JsonFileStore, MemoryStore, RecordStore, StoreError};

#[cfg(feature = "openrouter")]
pub use providers::{OpenRouterProvider, OpenRouterProviderFactory};
