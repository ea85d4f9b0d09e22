//! Price anomaly rule.
//!
//! Compares the awarded value with the buyer's own estimate. Overruns are
//! treated as more serious than underruns: an inflated price is a direct
//! loss, while a low price may be a specification problem.

use crate::facts::ContractFacts;
use crate::types::{FlagType, RedFlag, Severity};

use super::patterns::is_price_anomaly;
use super::{Rule, RuleHit};

const OVERRUN_POINTS: u32 = 35;
const UNDERRUN_POINTS: u32 = 25;
const CONFIDENCE: f64 = 0.85;

/// Flags contract values far from the estimate.
pub struct PriceAnomalyRule;

impl Rule for PriceAnomalyRule {
    fn name(&self) -> &'static str {
        "price_anomaly"
    }

    fn evaluate(&self, facts: &ContractFacts) -> Option<RuleHit> {
        let deviation = facts.price_deviation()?;
        if !is_price_anomaly(deviation) {
            return None;
        }

        let overrun = deviation > 0.0;
        let percent = deviation.abs() * 100.0;
        let (severity, points, direction) = if overrun {
            (Severity::Critical, OVERRUN_POINTS, "exceeds")
        } else {
            (Severity::High, UNDERRUN_POINTS, "is below")
        };

        let flag = RedFlag::new(
            FlagType::PriceAnomaly,
            severity,
            CONFIDENCE,
            format!("Contract value {} estimated value by {:.1}%", direction, percent),
        )
        .with_explanation(format!(
            "The awarded value is {:.1}% {} than the initial estimate. This can \
             indicate manipulated specifications or an incorrect valuation.",
            percent,
            if overrun { "higher" } else { "lower" }
        ));

        Some(RuleHit::flagged(points, flag))
    }
}
