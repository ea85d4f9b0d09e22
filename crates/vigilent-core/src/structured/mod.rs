//! Structured analysis returned by the language model.
//!
//! The model is asked for a fixed JSON shape. Anything that does not match
//! the schema is rejected here, and the caller treats it as a failed call.

mod schema;

pub use schema::validate_structured_analysis;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FlagType, RedFlag, RiskScore, Severity, MAX_RISK_SCORE};

/// Errors from parsing a model response.
#[derive(Error, Debug)]
pub enum StructuredAnalysisError {
    #[error("Response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// One flag as reported by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRedFlag {
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub severity: Severity,
    pub confidence: f64,
    pub explanation: String,
}

impl LlmRedFlag {
    /// Convert into a result flag. The description names the type; the model's
    /// wording goes into the explanation.
    pub fn into_red_flag(self) -> RedFlag {
        RedFlag::new(
            self.flag_type,
            self.severity,
            self.confidence,
            format!("AI-detected: {}", self.flag_type),
        )
        .with_explanation(self.explanation)
    }
}

/// Validated model analysis of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    /// Accepts integral floats such as `72.0`, which the schema also accepts
    #[serde(deserialize_with = "integral_score")]
    pub risk_score: u8,
    pub red_flags: Vec<LlmRedFlag>,
    pub summary: String,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_contracts_comparison: Option<String>,
}

fn integral_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    let in_range = (0.0..=f64::from(MAX_RISK_SCORE)).contains(&value);
    if value.is_finite() && value.fract() == 0.0 && in_range {
        Ok(value as u8)
    } else {
        Err(serde::de::Error::custom(format!(
            "risk_score must be an integer in [0, {MAX_RISK_SCORE}], got {value}"
        )))
    }
}

impl StructuredAnalysis {
    /// Validate a JSON value against the schema, then deserialize it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StructuredAnalysisError> {
        validate_structured_analysis(&value).map_err(StructuredAnalysisError::Schema)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Parse raw response text.
    pub fn parse(text: &str) -> Result<Self, StructuredAnalysisError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Model score as a [`RiskScore`]. Schema validation already bounds it.
    pub fn score(&self) -> RiskScore {
        RiskScore::capped(self.risk_score as u32)
    }

    /// Model flags converted to result flags, in response order.
    pub fn red_flags(&self) -> Vec<RedFlag> {
        self.red_flags
            .iter()
            .cloned()
            .map(LlmRedFlag::into_red_flag)
            .collect()
    }
}
