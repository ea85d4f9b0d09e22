//! Escalation policy: decides whether a contract is worth a model call.
//!
//! The policy is intentionally broader than the rules. A single bidder or a
//! price anomaly already produces a rule flag, and still escalates so the
//! model can add context the rules cannot see.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::facts::ContractFacts;
use crate::rules::patterns::is_price_anomaly;
use crate::types::RiskScore;

/// Contract value above which a model call is always made.
pub const ESCALATION_VALUE_THRESHOLD: f64 = 500_000.0;

/// Rule score at or above which a model call is made.
pub const ESCALATION_SCORE_THRESHOLD: u8 = 50;

/// Why a contract was escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    HighValue,
    HighRuleScore,
    SingleBidder,
    PriceAnomaly,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::HighValue => "high_value",
            EscalationReason::HighRuleScore => "high_rule_score",
            EscalationReason::SingleBidder => "single_bidder",
            EscalationReason::PriceAnomaly => "price_anomaly",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure predicate over facts and the rule score.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationPolicy;

impl EscalationPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Every condition that matches, in a fixed order.
    pub fn reasons(&self, facts: &ContractFacts, rule_score: RiskScore) -> Vec<EscalationReason> {
        let mut reasons = Vec::new();

        if facts.value().is_some_and(|v| v > ESCALATION_VALUE_THRESHOLD) {
            reasons.push(EscalationReason::HighValue);
        }
        if rule_score.value() >= ESCALATION_SCORE_THRESHOLD {
            reasons.push(EscalationReason::HighRuleScore);
        }
        if facts.bidder_count == Some(1) {
            reasons.push(EscalationReason::SingleBidder);
        }
        if facts.price_deviation().is_some_and(is_price_anomaly) {
            reasons.push(EscalationReason::PriceAnomaly);
        }

        reasons
    }

    /// Whether any escalation condition holds.
    pub fn should_escalate(&self, facts: &ContractFacts, rule_score: RiskScore) -> bool {
        !self.reasons(facts, rule_score).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleEngine;
    use proptest::prelude::*;

    fn facts() -> ContractFacts {
        ContractFacts::new("CN-3003", "Waste collection", "Municipality of Iasi")
    }

    #[test]
    fn test_quiet_contract_not_escalated() {
        let mut f = facts();
        f.contract_value = Some(20_000.0);
        f.bidder_count = Some(4);
        assert!(!EscalationPolicy::new().should_escalate(&f, RiskScore::capped(15)));
    }

    #[test]
    fn test_value_threshold_is_exclusive() {
        let mut f = facts();
        f.contract_value = Some(500_000.0);
        assert!(!EscalationPolicy::new().should_escalate(&f, RiskScore::ZERO));

        f.contract_value = Some(500_000.01);
        assert_eq!(
            EscalationPolicy::new().reasons(&f, RiskScore::ZERO),
            vec![EscalationReason::HighValue]
        );
    }

    #[test]
    fn test_score_threshold_is_inclusive() {
        let policy = EscalationPolicy::new();
        assert!(!policy.should_escalate(&facts(), RiskScore::capped(49)));
        assert_eq!(
            policy.reasons(&facts(), RiskScore::capped(50)),
            vec![EscalationReason::HighRuleScore]
        );
    }

    #[test]
    fn test_single_bidder_and_anomaly_reasons() {
        let mut f = facts();
        f.bidder_count = Some(1);
        f.contract_value = Some(135_000.0);
        f.estimated_value = Some(100_000.0);
        assert_eq!(
            EscalationPolicy::new().reasons(&f, RiskScore::ZERO),
            vec![EscalationReason::SingleBidder, EscalationReason::PriceAnomaly]
        );
    }

    proptest! {
        #[test]
        fn prop_rule_flags_imply_escalation(
            bidders in proptest::option::of(0u32..5),
            value in proptest::option::of(1.0f64..2_000_000.0),
            estimate in proptest::option::of(1.0f64..2_000_000.0),
        ) {
            let mut f = facts();
            f.bidder_count = bidders;
            f.contract_value = value;
            f.estimated_value = estimate;

            let analysis = RuleEngine::new().evaluate(&f);
            let flagged = analysis.red_flags.iter().any(|flag| {
                matches!(
                    flag.flag_type,
                    crate::types::FlagType::SingleBidder | crate::types::FlagType::PriceAnomaly
                )
            });
            if flagged {
                prop_assert!(EscalationPolicy::new().should_escalate(&f, analysis.risk_score));
            }
        }
    }
}
