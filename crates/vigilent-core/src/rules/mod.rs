//! Deterministic risk rules.
//!
//! Each rule looks at a contract's facts and either does nothing or adds
//! points to the score, usually with a red flag. Rules are independent:
//! scoring does not depend on evaluation order, and a rule whose inputs are
//! absent simply does not fire.
//!
//! | Rule | Flag | Points |
//! |------|------|--------|
//! | Single bidder | `single_bidder` (high) | 30 |
//! | Price anomaly | `price_anomaly` (critical/high) | 35/25 |
//! | Direct award | `direct_award` (high) | 25 |
//! | High value | none | 10 |
//! | Missing data | `missing_data` (medium) | 15 |

mod direct_award;
mod high_value;
mod missing_data;
pub mod patterns;
mod price_anomaly;
mod single_bidder;

pub use direct_award::DirectAwardRule;
pub use high_value::HighValueRule;
pub use missing_data::MissingDataRule;
pub use price_anomaly::PriceAnomalyRule;
pub use single_bidder::SingleBidderRule;

use crate::facts::ContractFacts;
use crate::types::{RedFlag, RiskScore, RuleAnalysis};

/// What a rule contributes when it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    /// Points added to the running score
    pub points: u32,

    /// Flag to report, if the rule emits one
    pub flag: Option<RedFlag>,
}

impl RuleHit {
    pub fn flagged(points: u32, flag: RedFlag) -> Self {
        Self {
            points,
            flag: Some(flag),
        }
    }

    pub fn points_only(points: u32) -> Self {
        Self { points, flag: None }
    }
}

/// A single deterministic risk rule.
///
/// Rules must be pure: same facts, same hit.
pub trait Rule: Send + Sync {
    /// Stable identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Evaluate the rule. `None` when it does not apply.
    fn evaluate(&self, facts: &ContractFacts) -> Option<RuleHit>;
}

/// Runs every registered rule and sums the result.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// Engine with the standard rule set, in reporting order.
    pub fn new() -> Self {
        Self::with_rules(vec![
            Box::new(SingleBidderRule),
            Box::new(PriceAnomalyRule),
            Box::new(DirectAwardRule),
            Box::new(HighValueRule),
            Box::new(MissingDataRule),
        ])
    }

    /// Engine with a custom rule set.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Evaluate all rules against the facts.
    ///
    /// Total: never fails. Flags are returned in rule order.
    pub fn evaluate(&self, facts: &ContractFacts) -> RuleAnalysis {
        let mut total: u32 = 0;
        let mut red_flags = Vec::new();

        for rule in &self.rules {
            if let Some(hit) = rule.evaluate(facts) {
                tracing::debug!(
                    contract_id = %facts.contract_id,
                    rule = rule.name(),
                    points = hit.points,
                    "Rule fired"
                );
                total = total.saturating_add(hit.points);
                red_flags.extend(hit.flag);
            }
        }

        RuleAnalysis {
            risk_score: RiskScore::capped(total),
            red_flags,
        }
    }

    /// Names of the registered rules.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlagType, Severity};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn complete_facts() -> ContractFacts {
        let mut facts = ContractFacts::new("CN-1001", "Road resurfacing", "City Hall Alba");
        facts.winner_name = Some("Asfalt SRL".to_string());
        facts.award_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        facts
    }

    #[test]
    fn test_nothing_fires_on_unremarkable_facts() {
        // Only the value is missing from the critical trio
        let facts = complete_facts();
        let analysis = RuleEngine::new().evaluate(&facts);
        assert_eq!(analysis.risk_score, RiskScore::ZERO);
        assert!(analysis.red_flags.is_empty());
    }

    #[test]
    fn test_all_optional_fields_absent() {
        let facts = ContractFacts::new("CN-1001", "Road resurfacing", "City Hall Alba");
        let analysis = RuleEngine::new().evaluate(&facts);
        assert_eq!(analysis.risk_score.value(), 15);
        assert_eq!(analysis.red_flags.len(), 1);
        assert_eq!(analysis.red_flags[0].flag_type, FlagType::MissingData);
    }

    #[test]
    fn test_single_bidder_scenario() {
        let mut facts = complete_facts();
        facts.bidder_count = Some(1);
        facts.contract_value = Some(40_000.0);

        let analysis = RuleEngine::new().evaluate(&facts);
        let single: Vec<_> = analysis
            .red_flags
            .iter()
            .filter(|f| f.flag_type == FlagType::SingleBidder)
            .collect();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].confidence, 0.95);
        assert!(analysis.risk_score.value() >= 30);
    }

    #[test]
    fn test_price_overrun_scenario() {
        let mut facts = complete_facts();
        facts.contract_value = Some(135_000.0);
        facts.estimated_value = Some(100_000.0);

        let analysis = RuleEngine::new().evaluate(&facts);
        assert_eq!(analysis.risk_score.value(), 35);
        assert_eq!(analysis.red_flags.len(), 1);
        assert_eq!(analysis.red_flags[0].flag_type, FlagType::PriceAnomaly);
        assert_eq!(analysis.red_flags[0].severity, Severity::Critical);
    }

    #[test]
    fn test_flags_in_rule_order() {
        let mut facts = ContractFacts::new("CN-1001", "Road resurfacing", "City Hall Alba");
        facts.bidder_count = Some(1);
        facts.contract_value = Some(2_000_000.0);
        facts.estimated_value = Some(1_000_000.0);
        facts.procedure_type = Some("Direct award".to_string());

        let analysis = RuleEngine::new().evaluate(&facts);
        let order: Vec<FlagType> = analysis.red_flags.iter().map(|f| f.flag_type).collect();
        assert_eq!(
            order,
            vec![
                FlagType::SingleBidder,
                FlagType::PriceAnomaly,
                FlagType::DirectAward,
                FlagType::MissingData,
            ]
        );
        // 30 + 35 + 25 + 10 + 15 = 115, capped
        assert_eq!(analysis.risk_score.value(), 100);
    }

    #[test]
    fn test_rule_names() {
        assert_eq!(
            RuleEngine::new().rule_names(),
            vec![
                "single_bidder",
                "price_anomaly",
                "direct_award",
                "high_value",
                "missing_data"
            ]
        );
    }

    fn arb_facts() -> impl Strategy<Value = ContractFacts> {
        (
            proptest::option::of(0.0f64..5_000_000.0),
            proptest::option::of(0.0f64..5_000_000.0),
            proptest::option::of(0u32..10),
            proptest::option::of(prop_oneof![
                Just("Direct award".to_string()),
                Just("Open tender".to_string()),
                Just("negotiated".to_string()),
            ]),
            proptest::option::of("[A-Za-z ]{0,12}"),
            any::<bool>(),
        )
            .prop_map(|(value, estimate, bidders, procedure, winner, dated)| {
                let mut facts = ContractFacts::new("CN-PROP", "Property contract", "Buyer Org");
                facts.contract_value = value;
                facts.estimated_value = estimate;
                facts.bidder_count = bidders;
                facts.procedure_type = procedure;
                facts.winner_name = winner;
                facts.award_date = if dated {
                    NaiveDate::from_ymd_opt(2024, 1, 15)
                } else {
                    None
                };
                facts
            })
    }

    proptest! {
        #[test]
        fn prop_score_in_bounds(facts in arb_facts()) {
            let analysis = RuleEngine::new().evaluate(&facts);
            prop_assert!(analysis.risk_score.value() <= 100);
        }

        #[test]
        fn prop_evaluation_is_deterministic(facts in arb_facts()) {
            let engine = RuleEngine::new();
            prop_assert_eq!(engine.evaluate(&facts), engine.evaluate(&facts));
        }

        #[test]
        fn prop_single_bidder_always_flagged(facts in arb_facts()) {
            let mut facts = facts;
            facts.bidder_count = Some(1);
            let analysis = RuleEngine::new().evaluate(&facts);
            let count = analysis
                .red_flags
                .iter()
                .filter(|f| f.flag_type == FlagType::SingleBidder && f.confidence == 0.95)
                .count();
            prop_assert_eq!(count, 1);
            prop_assert!(analysis.risk_score.value() >= 30);
        }

        #[test]
        fn prop_flag_types_unique(facts in arb_facts()) {
            let analysis = RuleEngine::new().evaluate(&facts);
            let mut types: Vec<_> = analysis.red_flags.iter().map(|f| f.flag_type).collect();
            let before = types.len();
            types.sort();
            types.dedup();
            prop_assert_eq!(types.len(), before);
        }
    }
}
