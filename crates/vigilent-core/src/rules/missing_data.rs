//! Missing critical data rule.
//!
//! Award date, winner and value are the minimum a published award must
//! carry. One gap is common in registry exports; two or more is treated as
//! a transparency problem.

use crate::facts::ContractFacts;
use crate::types::{FlagType, RedFlag, Severity};

use super::{Rule, RuleHit};

const POINTS: u32 = 15;
const CONFIDENCE: f64 = 1.0;
const MIN_MISSING: usize = 2;

/// Flags records lacking at least two critical fields.
pub struct MissingDataRule;

impl MissingDataRule {
    /// Names of the critical fields that are absent, in fixed order.
    pub fn missing_fields(facts: &ContractFacts) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if facts.award_date.is_none() {
            missing.push("award_date");
        }
        if facts.winner().is_none() {
            missing.push("winner_name");
        }
        if facts.value().is_none() {
            missing.push("contract_value");
        }
        missing
    }
}

impl Rule for MissingDataRule {
    fn name(&self) -> &'static str {
        "missing_data"
    }

    fn evaluate(&self, facts: &ContractFacts) -> Option<RuleHit> {
        let missing = Self::missing_fields(facts);
        if missing.len() < MIN_MISSING {
            return None;
        }

        let listed = missing.join(", ");
        let flag = RedFlag::new(
            FlagType::MissingData,
            Severity::Medium,
            CONFIDENCE,
            format!("Missing critical fields: {}", listed),
        )
        .with_explanation(format!(
            "Critical information is missing: {}. Lack of transparency can point \
             to problems in the procurement process.",
            listed
        ));

        Some(RuleHit::flagged(POINTS, flag))
    }
}
