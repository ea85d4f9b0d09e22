//! Record stores for cached analyses.
//!
//! The analysis cache only needs four operations, expressed by
//! [`RecordStore`]. Two implementations ship with the runtime:
//!
//! | Store | Backing | Survives restart |
//! |-------|---------|------------------|
//! | [`MemoryStore`] | moka, bounded | no |
//! | [`JsonFileStore`] | one JSON document | yes |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use vigilent_core::ContractHash;

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Errors from a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// One cached model analysis.
///
/// Entries are replaced whole on upsert, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub contract_hash: ContractHash,

    /// Model analysis as returned, validated on read
    pub analysis: JsonValue,

    pub model_used: String,

    pub tokens_used: u32,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Logically deleted once `now` is past the expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Keyed storage for cache entries.
///
/// Upserts are last-write-wins; implementations need no other coordination.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Entry for a hash, expired or not.
    async fn get_entry(&self, hash: &ContractHash) -> Result<Option<CacheEntry>, StoreError>;

    /// Insert or replace the entry for `entry.contract_hash`.
    async fn upsert_entry(&self, entry: CacheEntry) -> Result<(), StoreError>;

    /// Delete entries with `expires_at < before`. Returns the number deleted.
    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError>;

    /// Store name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::Duration as ChronoDuration;

    /// Entry created `age_days` ago with the standard 30 day lifetime.
    pub fn entry(seed: &str, age_days: i64, tokens_used: u32) -> CacheEntry {
        let created_at = Utc::now() - ChronoDuration::days(age_days);
        CacheEntry {
            contract_hash: ContractHash::from_hex(format!("{:0>64}", seed)),
            analysis: serde_json::json!({
                "risk_score": 10,
                "red_flags": [],
                "summary": "ok",
                "recommendations": []
            }),
            model_used: "deepseek/deepseek-chat".to_string(),
            tokens_used,
            created_at,
            expires_at: created_at + ChronoDuration::days(30),
        }
    }

    /// Store whose every call fails.
    pub struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn get_entry(&self, _: &ContractHash) -> Result<Option<CacheEntry>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn upsert_entry(&self, _: CacheEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_strict() {
        let entry = testing::entry("a1", 0, 0);
        assert!(!entry.is_expired_at(entry.expires_at));
        assert!(entry.is_expired_at(entry.expires_at + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_entry_round_trips_as_json() {
        let entry = testing::entry("b2", 3, 640);
        let text = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, entry);
    }
}
