//! Shared types for risk analysis.
//!
//! Everything here is plain data: flags, scores and the final result.
//! Scoring logic lives in [`crate::rules`], merging in [`crate::merge`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum risk score.
pub const MAX_RISK_SCORE: u8 = 100;

/// Severity of a red flag.
///
/// Ordering is meaningful: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of anomaly a red flag reports.
///
/// The first four are produced by the rule engine; the model may report any
/// of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    SingleBidder,
    PriceAnomaly,
    DirectAward,
    MissingData,
    NarrowSpecs,
    ContractSplitting,
    RepeatedWinner,
    LastMinuteChange,
    AwardDelay,
}

impl FlagType {
    /// All flag types, in taxonomy order.
    pub const ALL: [FlagType; 9] = [
        FlagType::SingleBidder,
        FlagType::PriceAnomaly,
        FlagType::DirectAward,
        FlagType::MissingData,
        FlagType::NarrowSpecs,
        FlagType::ContractSplitting,
        FlagType::RepeatedWinner,
        FlagType::LastMinuteChange,
        FlagType::AwardDelay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::SingleBidder => "single_bidder",
            FlagType::PriceAnomaly => "price_anomaly",
            FlagType::DirectAward => "direct_award",
            FlagType::MissingData => "missing_data",
            FlagType::NarrowSpecs => "narrow_specs",
            FlagType::ContractSplitting => "contract_splitting",
            FlagType::RepeatedWinner => "repeated_winner",
            FlagType::LastMinuteChange => "last_minute_change",
            FlagType::AwardDelay => "award_delay",
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural contract violations.
///
/// These mean a flag or score was built outside its allowed range. Merging
/// cannot proceed safely, so they are raised rather than absorbed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("confidence {confidence} for {flag_type} is outside [0, 1]")]
    ConfidenceOutOfRange { flag_type: FlagType, confidence: f64 },

    #[error("risk score {0} is outside [0, 100]")]
    ScoreOutOfRange(i64),
}

/// A typed, severity-ranked, confidence-scored finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub flag_type: FlagType,
    pub severity: Severity,

    /// Confidence in the finding (0.0 - 1.0)
    pub confidence: f64,

    /// Short human-readable description
    pub description: String,

    /// Longer natural-language explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl RedFlag {
    pub fn new(
        flag_type: FlagType,
        severity: Severity,
        confidence: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            flag_type,
            severity,
            confidence,
            description: description.into(),
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Check that the confidence is a finite number in `[0, 1]`.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        if self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence) {
            Ok(())
        } else {
            Err(InvariantViolation::ConfidenceOutOfRange {
                flag_type: self.flag_type,
                confidence: self.confidence,
            })
        }
    }
}

/// Risk score in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    pub const ZERO: RiskScore = RiskScore(0);

    /// Build a score from an accumulated sum, capping at 100.
    pub fn capped(total: u32) -> Self {
        Self(total.min(MAX_RISK_SCORE as u32) as u8)
    }

    /// Build a score, rejecting values outside `[0, 100]`.
    pub fn try_new(value: i64) -> Result<Self, InvariantViolation> {
        if (0..=MAX_RISK_SCORE as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(InvariantViolation::ScoreOutOfRange(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output of the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAnalysis {
    pub risk_score: RiskScore,

    /// Flags in rule order
    pub red_flags: Vec<RedFlag>,
}

/// How a result was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Deterministic rules only
    RulesOnly,

    /// Rules merged with a model analysis
    AiAugmented {
        model: String,
        tokens_used: u32,
        from_cache: bool,
        summary: String,
        #[serde(default)]
        recommendations: Vec<String>,
    },
}

/// Final result for one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub risk_score: RiskScore,

    /// Flags ordered by severity (critical first), stable on ties
    pub red_flags: Vec<RedFlag>,

    pub mode: AnalysisMode,

    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Wrap a rule analysis as a rules-only result.
    pub fn rules_only(analysis: RuleAnalysis) -> Self {
        let mut red_flags = analysis.red_flags;
        crate::merge::sort_by_severity(&mut red_flags);
        Self {
            risk_score: analysis.risk_score,
            red_flags,
            mode: AnalysisMode::RulesOnly,
            analyzed_at: Utc::now(),
        }
    }

    pub fn ai_powered(&self) -> bool {
        matches!(self.mode, AnalysisMode::AiAugmented { .. })
    }

    pub fn from_cache(&self) -> Option<bool> {
        match &self.mode {
            AnalysisMode::AiAugmented { from_cache, .. } => Some(*from_cache),
            AnalysisMode::RulesOnly => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match &self.mode {
            AnalysisMode::AiAugmented { model, .. } => Some(model),
            AnalysisMode::RulesOnly => None,
        }
    }

    pub fn tokens_used(&self) -> Option<u32> {
        match &self.mode {
            AnalysisMode::AiAugmented { tokens_used, .. } => Some(*tokens_used),
            AnalysisMode::RulesOnly => None,
        }
    }

    /// Version tag recorded alongside stored results.
    pub fn analysis_version(&self) -> &'static str {
        if self.ai_powered() {
            "ai-v1"
        } else {
            "rules-v1"
        }
    }

    /// Whether a flag of the given type is present.
    pub fn has_flag(&self, flag_type: FlagType) -> bool {
        self.red_flags.iter().any(|f| f.flag_type == flag_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_flag_type_wire_names() {
        for flag_type in FlagType::ALL {
            let json = serde_json::to_string(&flag_type).unwrap();
            assert_eq!(json, format!("\"{}\"", flag_type.as_str()));
        }
    }

    #[test]
    fn test_unknown_severity_rejected() {
        let result: Result<Severity, _> = serde_json::from_str("\"severe\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_score_capped() {
        assert_eq!(RiskScore::capped(0).value(), 0);
        assert_eq!(RiskScore::capped(85).value(), 85);
        assert_eq!(RiskScore::capped(115).value(), 100);
    }

    #[test]
    fn test_score_try_new() {
        assert!(RiskScore::try_new(100).is_ok());
        assert_eq!(
            RiskScore::try_new(101),
            Err(InvariantViolation::ScoreOutOfRange(101))
        );
        assert!(RiskScore::try_new(-1).is_err());
    }

    #[test]
    fn test_flag_confidence_check() {
        let ok = RedFlag::new(FlagType::SingleBidder, Severity::High, 0.95, "ok");
        assert!(ok.check().is_ok());

        let bad = RedFlag::new(FlagType::SingleBidder, Severity::High, 1.5, "bad");
        assert!(bad.check().is_err());

        let nan = RedFlag::new(FlagType::SingleBidder, Severity::High, f64::NAN, "nan");
        assert!(nan.check().is_err());
    }

    #[test]
    fn test_rules_only_result_accessors() {
        let result = AnalysisResult::rules_only(RuleAnalysis {
            risk_score: RiskScore::capped(30),
            red_flags: vec![],
        });
        assert!(!result.ai_powered());
        assert_eq!(result.from_cache(), None);
        assert_eq!(result.tokens_used(), None);
        assert_eq!(result.analysis_version(), "rules-v1");
    }
}
