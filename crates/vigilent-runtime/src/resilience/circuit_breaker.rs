//! Circuit breaker for model calls.
//!
//! When calls to a model fail repeatedly the circuit opens, and contracts
//! are scored by rules only until the recovery timeout passes.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Time before a trial call is allowed
    #[serde(with = "crate::config::humantime_duration")]
    pub recovery_timeout: Duration,

    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    Closed { failures: u32 },

    /// Calls bypass the model
    Open { opened_at: Instant },

    /// Trial calls allowed
    HalfOpen { successes: u32 },
}

/// Per-model circuit breaker.
///
/// Each model has its own circuit, so switching models in config is not
/// blocked by another model's outage.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `model` should be skipped.
    ///
    /// An open circuit past its recovery timeout moves to half-open and
    /// lets the call through.
    pub fn is_open(&self, model: &str) -> bool {
        let states = self.states.read();
        match states.get(model) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(model);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, model: &str) {
        let mut states = self.states.write();
        match states.get(model).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(model.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(model, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        model.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { failures }) if failures > 0 => {
                states.insert(model.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, model: &str) {
        let mut states = self.states.write();
        let failures = match states.get(model).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    model.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(model, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                model.to_string(),
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(model, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(model.to_string(), CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, model: &str) {
        let mut states = self.states.write();
        if matches!(states.get(model), Some(CircuitState::Open { .. })) {
            states.insert(model.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(model, "Circuit half-open, allowing trial call");
        }
    }

    #[cfg(test)]
    fn state(&self, model: &str) -> CircuitState {
        self.states
            .read()
            .get(model)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
