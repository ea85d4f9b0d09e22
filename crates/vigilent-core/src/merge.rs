//! Merger: reconciles rule findings with a model analysis.
//!
//! The merge policy is fixed:
//! 1. One flag per type survives, the one with the highest confidence
//! 2. A surviving flag keeps the position where its type first appeared
//! 3. Final score is the larger of the two scores
//! 4. Output is ordered by severity, critical first, stable on ties

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Utc;

use crate::structured::StructuredAnalysis;
use crate::types::{
    AnalysisMode, AnalysisResult, FlagType, InvariantViolation, RedFlag, RiskScore, RuleAnalysis,
};

/// Model metadata attached to a merged result.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRun {
    pub model: String,
    pub tokens_used: u32,
    pub from_cache: bool,
}

/// Merges rule and model findings into a final result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merger;

impl Merger {
    pub fn new() -> Self {
        Self
    }

    /// Merge a rule analysis with a model analysis.
    ///
    /// Fails only if a flag confidence is outside `[0, 1]`.
    pub fn merge(
        &self,
        rules: &RuleAnalysis,
        ai: &StructuredAnalysis,
        run: ModelRun,
    ) -> Result<AnalysisResult, InvariantViolation> {
        let combined = rules
            .red_flags
            .iter()
            .cloned()
            .chain(ai.red_flags());
        let mut red_flags = dedupe_by_type(combined)?;
        sort_by_severity(&mut red_flags);

        let risk_score = max_score(rules.risk_score, ai.score());

        tracing::debug!(
            rule_score = rules.risk_score.value(),
            ai_score = ai.risk_score,
            final_score = risk_score.value(),
            flags = red_flags.len(),
            "Merged analysis"
        );

        Ok(AnalysisResult {
            risk_score,
            red_flags,
            mode: AnalysisMode::AiAugmented {
                model: run.model,
                tokens_used: run.tokens_used,
                from_cache: run.from_cache,
                summary: ai.summary.clone(),
                recommendations: ai.recommendations.clone(),
            },
            analyzed_at: Utc::now(),
        })
    }
}

/// Keep the highest-confidence flag per type.
///
/// Ties keep the earlier flag. Each survivor sits where its type first
/// appeared in the input.
pub fn dedupe_by_type<I>(flags: I) -> Result<Vec<RedFlag>, InvariantViolation>
where
    I: IntoIterator<Item = RedFlag>,
{
    let mut best: HashMap<FlagType, (usize, RedFlag)> = HashMap::new();

    for (index, flag) in flags.into_iter().enumerate() {
        flag.check()?;
        match best.entry(flag.flag_type) {
            Entry::Occupied(mut slot) => {
                if flag.confidence > slot.get().1.confidence {
                    slot.get_mut().1 = flag;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert((index, flag));
            }
        }
    }

    let mut survivors: Vec<(usize, RedFlag)> = best.into_values().collect();
    survivors.sort_by_key(|(index, _)| *index);
    Ok(survivors.into_iter().map(|(_, flag)| flag).collect())
}

/// Stable sort, most severe first.
pub fn sort_by_severity(flags: &mut [RedFlag]) {
    flags.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// Larger of two scores.
pub fn max_score(a: RiskScore, b: RiskScore) -> RiskScore {
    a.max(b)
}
