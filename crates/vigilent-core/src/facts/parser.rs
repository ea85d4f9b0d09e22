//! Contract facts parsing from YAML/JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Minimum lengths for identifying fields.
const MIN_CONTRACT_ID_LEN: usize = 3;
const MIN_TITLE_LEN: usize = 5;
const MIN_BUYER_NAME_LEN: usize = 3;

/// Errors that can occur when loading or validating facts.
#[derive(Error, Debug)]
pub enum FactsError {
    #[error("Failed to read facts file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Record {index} is malformed: {source}")]
    MalformedRecord {
        index: usize,
        source: serde_json::Error,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field '{field}' is too short (minimum {min} characters)")]
    TooShort { field: String, min: usize },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Facts about one public procurement contract.
///
/// Only `contract_id`, `title` and `buyer_name` are required. Everything else
/// is optional; rules that need an absent field are skipped.
///
/// Required fields default to empty when absent so that [`validate`] reports
/// them per record instead of the whole document failing to parse.
///
/// [`validate`]: ContractFacts::validate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFacts {
    /// Registry identifier of the contract
    #[serde(default)]
    pub contract_id: String,

    #[serde(default)]
    pub title: String,

    /// Contracting authority
    #[serde(default)]
    pub buyer_name: String,

    #[serde(default, alias = "buyer_cui")]
    pub buyer_tax_id: Option<String>,

    /// Awarded economic operator
    #[serde(default)]
    pub winner_name: Option<String>,

    #[serde(default, alias = "winner_cui")]
    pub winner_tax_id: Option<String>,

    #[serde(default)]
    pub contract_value: Option<f64>,

    #[serde(default)]
    pub estimated_value: Option<f64>,

    #[serde(default, alias = "num_bidders")]
    pub bidder_count: Option<u32>,

    /// Procedure type as published (e.g. "open tender", "direct award")
    #[serde(default)]
    pub procedure_type: Option<String>,

    #[serde(default)]
    pub award_date: Option<NaiveDate>,

    #[serde(default)]
    pub publication_date: Option<NaiveDate>,

    // Descriptive fields. Never used for scoring or hashing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpv_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, alias = "judet", skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ContractFacts {
    /// Minimal facts with only the required fields set.
    pub fn new(
        contract_id: impl Into<String>,
        title: impl Into<String>,
        buyer_name: impl Into<String>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            title: title.into(),
            buyer_name: buyer_name.into(),
            buyer_tax_id: None,
            winner_name: None,
            winner_tax_id: None,
            contract_value: None,
            estimated_value: None,
            bidder_count: None,
            procedure_type: None,
            award_date: None,
            publication_date: None,
            description: None,
            currency: None,
            cpv_code: None,
            location: None,
            county: None,
            status: None,
        }
    }

    /// Parse facts from a YAML string and validate them.
    pub fn from_yaml(yaml: &str) -> Result<Self, FactsError> {
        let facts: ContractFacts = serde_yaml::from_str(yaml)?;
        facts.validate()?;
        Ok(facts)
    }

    /// Parse facts from a JSON string and validate them.
    pub fn from_json(json: &str) -> Result<Self, FactsError> {
        let facts: ContractFacts = serde_json::from_str(json)?;
        facts.validate()?;
        Ok(facts)
    }

    /// Load one or many records from a `.json`, `.yaml` or `.yml` file.
    ///
    /// Records are NOT validated here: batch callers report invalid records
    /// individually instead of failing the whole file. A record whose fields
    /// have the wrong type fails the load with its index.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<Self>, FactsError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let document: JsonValue = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        let records = match document {
            JsonValue::Array(records) => records,
            single => vec![single],
        };

        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value(record)
                    .map_err(|source| FactsError::MalformedRecord { index, source })
            })
            .collect()
    }

    /// Validate required fields and monetary amounts.
    pub fn validate(&self) -> Result<(), FactsError> {
        require_len("contract_id", &self.contract_id, MIN_CONTRACT_ID_LEN)?;
        require_len("title", &self.title, MIN_TITLE_LEN)?;
        require_len("buyer_name", &self.buyer_name, MIN_BUYER_NAME_LEN)?;

        require_amount("contract_value", self.contract_value)?;
        require_amount("estimated_value", self.estimated_value)?;

        Ok(())
    }

    /// Contract value, if present and positive.
    pub fn value(&self) -> Option<f64> {
        positive(self.contract_value)
    }

    /// Estimated value, if present and positive.
    pub fn estimate(&self) -> Option<f64> {
        positive(self.estimated_value)
    }

    /// Winner name, if present and not blank.
    pub fn winner(&self) -> Option<&str> {
        self.winner_name
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }

    /// Relative deviation of the contract value from the estimate.
    ///
    /// `None` unless both amounts are present.
    pub fn price_deviation(&self) -> Option<f64> {
        match (self.value(), self.estimate()) {
            (Some(value), Some(estimate)) => Some((value - estimate) / estimate),
            _ => None,
        }
    }
}

fn positive(amount: Option<f64>) -> Option<f64> {
    amount.filter(|v| v.is_finite() && *v > 0.0)
}

fn require_len(field: &str, value: &str, min: usize) -> Result<(), FactsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FactsError::MissingField(field.to_string()));
    }
    if trimmed.chars().count() < min {
        return Err(FactsError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    Ok(())
}

fn require_amount(field: &str, amount: Option<f64>) -> Result<(), FactsError> {
    match amount {
        Some(v) if !v.is_finite() => Err(FactsError::InvalidValue {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        }),
        Some(v) if v < 0.0 => Err(FactsError::InvalidValue {
            field: field.to_string(),
            reason: "must not be negative".to_string(),
        }),
        _ => Ok(()),
    }
}
