//! Single bidder rule.
//!
//! A tender with exactly one offer in a competitive market is the
//! strongest single indicator of a rigged procedure.

use crate::facts::ContractFacts;
use crate::types::{FlagType, RedFlag, Severity};

use super::{Rule, RuleHit};

const POINTS: u32 = 30;
const CONFIDENCE: f64 = 0.95;

/// Flags contracts that received exactly one bid.
pub struct SingleBidderRule;

impl Rule for SingleBidderRule {
    fn name(&self) -> &'static str {
        "single_bidder"
    }

    fn evaluate(&self, facts: &ContractFacts) -> Option<RuleHit> {
        if facts.bidder_count != Some(1) {
            return None;
        }

        let flag = RedFlag::new(
            FlagType::SingleBidder,
            Severity::High,
            CONFIDENCE,
            "Contract had only one bidder",
        )
        .with_explanation(
            "Only one bidder took part in this procedure. In a competitive market \
             several operators are expected to bid; a lone offer can point to a \
             tailored or manipulated tender.",
        );

        Some(RuleHit::flagged(POINTS, flag))
    }
}
