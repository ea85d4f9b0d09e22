//! # vigilent-core
//!
//! Deterministic corruption-risk analysis for public procurement contracts.
//!
//! This crate answers, without any network access:
//! - How risky does this contract look on its published facts?
//! - Is it worth asking a language model for a second opinion?
//! - How are rule findings and model findings combined?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same facts always produce the same rule result
//! 2. **No LLM calls**: Model analysis lives in `vigilent-runtime`
//! 3. **Bounded**: Scores are always within `[0, 100]`
//! 4. **Stable identity**: The contract hash only depends on seven fields
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigilent_core::{evaluate, ContractFacts, EscalationPolicy};
//!
//! let facts = ContractFacts::from_yaml(&std::fs::read_to_string("contract.yaml")?)?;
//! let analysis = evaluate(&facts)?;
//!
//! if EscalationPolicy::new().should_escalate(&facts, analysis.risk_score) {
//!     println!("needs model review: {}", analysis.risk_score);
//! }
//! ```

pub mod escalation;
pub mod facts;
pub mod merge;
pub mod rules;
pub mod structured;
pub mod types;

// Re-export main types at crate root
pub use escalation::{EscalationPolicy, EscalationReason};
pub use facts::{ContractFacts, ContractHash, FactsError};
pub use merge::{dedupe_by_type, sort_by_severity, Merger, ModelRun};
pub use rules::{Rule, RuleEngine, RuleHit};
pub use structured::{LlmRedFlag, StructuredAnalysis, StructuredAnalysisError};
pub use types::{
    AnalysisMode, AnalysisResult, FlagType, InvariantViolation, RedFlag, RiskScore, RuleAnalysis,
    Severity, MAX_RISK_SCORE,
};

/// Validate facts and run the standard rule set.
///
/// This is the rules-only entry point. Invalid facts are rejected before any
/// rule runs.
pub fn evaluate(facts: &ContractFacts) -> Result<RuleAnalysis, FactsError> {
    facts.validate()?;
    Ok(RuleEngine::new().evaluate(facts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_evaluation() {
        let yaml = r#"
contract_id: "CN-4004"
title: "Hospital wing extension"
buyer_name: "County Hospital Sibiu"
winner_name: "Constructii SA"
contract_value: 2400000
estimated_value: 1500000
bidder_count: 1
procedure_type: "Open tender"
award_date: "2024-06-12"
"#;
        let facts = ContractFacts::from_yaml(yaml).unwrap();
        let analysis = evaluate(&facts).unwrap();

        // single bidder 30 + overrun 35 + high value 10
        assert_eq!(analysis.risk_score.value(), 75);
        assert!(EscalationPolicy::new().should_escalate(&facts, analysis.risk_score));

        let result = AnalysisResult::rules_only(analysis);
        assert_eq!(result.red_flags[0].flag_type, FlagType::PriceAnomaly);
    }

    #[test]
    fn test_invalid_facts_rejected() {
        let facts = ContractFacts::new("CN-4004", "", "County Hospital Sibiu");
        assert!(matches!(evaluate(&facts), Err(FactsError::MissingField(_))));
    }
}
