//! High value base risk. Raises scrutiny without emitting a flag.

use crate::facts::ContractFacts;

use super::patterns::HIGH_VALUE_THRESHOLD;
use super::{Rule, RuleHit};

const POINTS: u32 = 10;

pub struct HighValueRule;

impl Rule for HighValueRule {
    fn name(&self) -> &'static str {
        "high_value"
    }

    fn evaluate(&self, facts: &ContractFacts) -> Option<RuleHit> {
        facts
            .value()
            .filter(|v| *v > HIGH_VALUE_THRESHOLD)
            .map(|_| RuleHit::points_only(POINTS))
    }
}
