//! Direct award rule.

use crate::facts::ContractFacts;
use crate::types::{FlagType, RedFlag, Severity};

use super::patterns::{is_direct_procedure, DIRECT_AWARD_VALUE_THRESHOLD};
use super::{Rule, RuleHit};

const POINTS: u32 = 25;
const CONFIDENCE: f64 = 0.80;

/// Flags high-value contracts awarded without open competition.
pub struct DirectAwardRule;

impl Rule for DirectAwardRule {
    fn name(&self) -> &'static str {
        "direct_award"
    }

    fn evaluate(&self, facts: &ContractFacts) -> Option<RuleHit> {
        let procedure = facts.procedure_type.as_deref()?;
        let value = facts.value()?;

        if !is_direct_procedure(procedure) || value <= DIRECT_AWARD_VALUE_THRESHOLD {
            return None;
        }

        let flag = RedFlag::new(
            FlagType::DirectAward,
            Severity::High,
            CONFIDENCE,
            "High-value direct award",
        )
        .with_explanation(
            "A high-value contract was awarded directly, without open competition. \
             Procurement law requires a clear justification for this.",
        );

        Some(RuleHit::flagged(POINTS, flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(procedure: Option<&str>, value: Option<f64>) -> ContractFacts {
        let mut facts = ContractFacts::new("CN-1", "IT services", "Ministry of Finance");
        facts.procedure_type = procedure.map(str::to_string);
        facts.contract_value = value;
        facts
    }

    #[test]
    fn test_direct_award_above_threshold() {
        let hit = DirectAwardRule
            .evaluate(&facts(Some("Atribuire DIRECTA"), Some(50_001.0)))
            .unwrap();
        assert_eq!(hit.points, 25);
        assert_eq!(hit.flag.unwrap().confidence, 0.80);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(DirectAwardRule
            .evaluate(&facts(Some("direct"), Some(50_000.0)))
            .is_none());
    }

    #[test]
    fn test_competitive_procedure_skips() {
        assert!(DirectAwardRule
            .evaluate(&facts(Some("Open tender"), Some(900_000.0)))
            .is_none());
    }

    #[test]
    fn test_missing_inputs_skip() {
        assert!(DirectAwardRule.evaluate(&facts(None, Some(900_000.0))).is_none());
        assert!(DirectAwardRule.evaluate(&facts(Some("direct"), None)).is_none());
    }
}
