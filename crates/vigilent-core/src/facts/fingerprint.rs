//! Content hash of the fields that identify a contract's analysis.
//!
//! Only seven fields take part. Editing any other field (dates, procedure
//! type, descriptive metadata) leaves the hash unchanged, so it does not
//! force a new model analysis.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::ContractFacts;

/// Canonical form hashed for a contract. Field order here is the
/// serialization order and must not change.
#[derive(Serialize)]
struct HashFields<'a> {
    contract_id: &'a str,
    title: &'a str,
    buyer_name: &'a str,
    winner_name: Option<&'a str>,
    contract_value: Option<f64>,
    estimated_value: Option<f64>,
    bidder_count: Option<u32>,
}

/// Hex-encoded SHA-256 digest identifying a contract's analysis input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractHash(String);

impl ContractHash {
    /// Length of the hex digest.
    pub const LEN: usize = 64;

    /// Compute the hash for a set of facts.
    pub fn of(facts: &ContractFacts) -> Self {
        let fields = HashFields {
            contract_id: &facts.contract_id,
            title: &facts.title,
            buyer_name: &facts.buyer_name,
            winner_name: facts.winner_name.as_deref(),
            contract_value: facts.contract_value,
            estimated_value: facts.estimated_value,
            bidder_count: facts.bidder_count,
        };

        // Infallible for this shape; non-finite floats serialize as null.
        let canonical = serde_json::to_vec(&fields).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Self::from_hex(hex::encode(hasher.finalize()))
    }

    /// Wrap an existing digest string (e.g. read back from a store).
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContractHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn base_facts() -> ContractFacts {
        let mut facts = ContractFacts::new("CN-1001", "Road resurfacing", "City Hall Alba");
        facts.winner_name = Some("Asfalt SRL".to_string());
        facts.contract_value = Some(135_000.0);
        facts.estimated_value = Some(100_000.0);
        facts.bidder_count = Some(1);
        facts
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = ContractHash::of(&base_facts());
        assert_eq!(hash.as_str().len(), ContractHash::LEN);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash.short().len(), 8);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(ContractHash::of(&base_facts()), ContractHash::of(&base_facts()));
    }

    #[test]
    fn test_irrelevant_fields_do_not_change_hash() {
        let original = ContractHash::of(&base_facts());

        let mut edited = base_facts();
        edited.procedure_type = Some("Direct award".to_string());
        edited.award_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        edited.publication_date = NaiveDate::from_ymd_opt(2024, 4, 1);
        edited.buyer_tax_id = Some("RO999".to_string());
        edited.winner_tax_id = Some("RO111".to_string());
        edited.description = Some("Updated description".to_string());
        edited.county = Some("Alba".to_string());

        assert_eq!(ContractHash::of(&edited), original);
    }

    #[test]
    fn test_field_order_in_source_does_not_matter() {
        let a = ContractFacts::from_json(
            r#"{"contract_id":"CN-1001","title":"Road resurfacing","buyer_name":"City Hall Alba","bidder_count":1}"#,
        )
        .unwrap();
        let b = ContractFacts::from_json(
            r#"{"bidder_count":1,"buyer_name":"City Hall Alba","title":"Road resurfacing","contract_id":"CN-1001"}"#,
        )
        .unwrap();
        assert_eq!(ContractHash::of(&a), ContractHash::of(&b));
    }

    #[test]
    fn test_each_relevant_field_changes_hash() {
        let original = ContractHash::of(&base_facts());
        let edits: Vec<fn(&mut ContractFacts)> = vec![
            |f| f.contract_id.push('X'),
            |f| f.title.push('X'),
            |f| f.buyer_name.push('X'),
            |f| f.winner_name = None,
            |f| f.contract_value = Some(135_001.0),
            |f| f.estimated_value = None,
            |f| f.bidder_count = Some(2),
        ];

        for edit in edits {
            let mut facts = base_facts();
            edit(&mut facts);
            assert_ne!(ContractHash::of(&facts), original);
        }
    }

    proptest! {
        #[test]
        fn prop_hash_ignores_metadata(
            procedure in proptest::option::of("[a-z ]{0,20}"),
            cpv in proptest::option::of("[0-9]{8}"),
            location in proptest::option::of("[A-Za-z]{0,12}"),
        ) {
            let mut facts = base_facts();
            facts.procedure_type = procedure;
            facts.cpv_code = cpv;
            facts.location = location;
            prop_assert_eq!(ContractHash::of(&facts), ContractHash::of(&base_facts()));
        }

        #[test]
        fn prop_hash_tracks_bidder_count(a in 0u32..50, b in 0u32..50) {
            let mut left = base_facts();
            left.bidder_count = Some(a);
            let mut right = base_facts();
            right.bidder_count = Some(b);
            prop_assert_eq!(ContractHash::of(&left) == ContractHash::of(&right), a == b);
        }
    }
}
