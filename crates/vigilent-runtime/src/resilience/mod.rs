//! Resilience patterns for model calls.
//!
//! - Circuit breaker, so a failing model stops being called for a while
//! - Token budget, so a batch cannot overspend

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
