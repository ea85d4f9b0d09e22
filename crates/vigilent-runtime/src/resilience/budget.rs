//! Token budget and usage accounting for model calls.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

/// A token allowance.
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    /// Saturates at `u32::MAX` so an overflow never frees budget.
    pub fn record(&self, tokens: u32) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_add(tokens))
            });
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used())
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Accumulated model usage for a process or batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    /// Model calls actually made
    pub llm_calls: u32,

    /// Escalations answered from the analysis cache
    pub cache_hits: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    /// Add usage from one completed call.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens as u64;
        self.completion_tokens += usage.completion_tokens as u64;
        self.total_tokens += usage.total() as u64;
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens (input, output) on OpenRouter
        let (input_rate, output_rate) = match model {
            m if m.starts_with("deepseek/") => (0.14, 0.28),
            m if m.contains(":free") => (0.0, 0.0),
            m if m.starts_with("meta-llama/") => (0.12, 0.30),
            m if m.contains("claude-sonnet") => (3.0, 15.0),
            m if m.contains("gpt-3.5-turbo") => (0.5, 1.5),
            _ => (1.0, 2.0),
        };

        (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate
            + (usage.completion_tokens as f64 / 1_000_000.0) * output_rate
    }
}

/// Tracks usage and enforces an optional global token budget.
pub struct BudgetTracker {
    budget: Option<TokenBudget>,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    /// `None` means unlimited.
    pub fn new(global_max: Option<u32>) -> Self {
        Self {
            budget: global_max.map(TokenBudget::new),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    /// Whether a call estimated at `estimated_tokens` fits the budget.
    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.budget
            .as_ref()
            .map_or(true, |b| b.can_afford(estimated_tokens))
    }

    pub fn record_usage(&self, usage: &TokenUsage, model: &str) {
        if let Some(budget) = &self.budget {
            budget.record(usage.total());
        }
        self.usage.write().add(usage, model);
    }

    pub fn record_cache_hit(&self) {
        self.usage.write().cache_hits += 1;
    }

    pub fn get_usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    /// Remaining tokens, `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.budget.as_ref().map(TokenBudget::remaining)
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(None)
    }
}
