//! Content-addressed cache of model analyses.
//!
//! Entries are keyed by [`ContractHash`] and live for [`CACHE_TTL_DAYS`].
//! The cache is read-through from the orchestrator's point of view: it is
//! consulted before any model call and written after a successful one.
//!
//! Reads and writes fail soft. A store error, a timeout, an expired entry or
//! a payload that no longer validates all count as a miss, and a failed
//! write is only logged. Maintenance operations report errors.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use vigilent_core::{ContractFacts, ContractHash, StructuredAnalysis};

use crate::store::{CacheEntry, RecordStore, StoreError};

/// Lifetime of a cached analysis.
pub const CACHE_TTL_DAYS: i64 = 30;

/// Errors from cache maintenance.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Record store timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cached analysis is invalid: {0}")]
    InvalidPayload(String),
}

/// A validated cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub entry: CacheEntry,
    pub analysis: StructuredAnalysis,
}

/// Outcome of a lookup, before it is collapsed to hit-or-miss.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(CachedAnalysis),
    Miss,
    /// Treated as a miss by callers; kept apart for logging and tests
    Error(CacheError),
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_cached: u64,

    /// Tokens recorded on cached entries, i.e. not spent again on a hit
    pub total_tokens_saved: u64,

    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Model analysis cache over a [`RecordStore`].
#[derive(Clone)]
pub struct AnalysisCache {
    store: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl AnalysisCache {
    /// `timeout` bounds every store call.
    pub fn new(store: Arc<dyn RecordStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Cache key for a contract.
    pub fn hash(facts: &ContractFacts) -> ContractHash {
        ContractHash::of(facts)
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Look up a hash, keeping the reason for a miss.
    pub async fn lookup(&self, hash: &ContractHash) -> CacheLookup {
        let entry = match self.bounded(self.store.get_entry(hash)).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => return CacheLookup::Error(e),
        };

        if entry.is_expired_at(Utc::now()) {
            tracing::debug!(hash = hash.short(), expires_at = %entry.expires_at, "Cache entry expired");
            return CacheLookup::Miss;
        }

        match StructuredAnalysis::from_value(entry.analysis.clone()) {
            Ok(analysis) => CacheLookup::Hit(CachedAnalysis { entry, analysis }),
            Err(e) => CacheLookup::Error(CacheError::InvalidPayload(e.to_string())),
        }
    }

    /// Look up a hash. Every failure is a miss.
    pub async fn get(&self, hash: &ContractHash) -> Option<CachedAnalysis> {
        match self.lookup(hash).await {
            CacheLookup::Hit(cached) => {
                tracing::debug!(hash = hash.short(), model = %cached.entry.model_used, "Cache hit");
                Some(cached)
            }
            CacheLookup::Miss => None,
            CacheLookup::Error(e) => {
                tracing::warn!(hash = hash.short(), error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store an analysis. Failures are logged, never returned.
    ///
    /// Returns whether the write succeeded.
    pub async fn put(
        &self,
        hash: &ContractHash,
        analysis: &StructuredAnalysis,
        model: &str,
        tokens_used: u32,
    ) -> bool {
        let payload = match serde_json::to_value(analysis) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(hash = hash.short(), error = %e, "Failed to encode analysis for cache");
                return false;
            }
        };

        let created_at = Utc::now();
        let entry = CacheEntry {
            contract_hash: hash.clone(),
            analysis: payload,
            model_used: model.to_string(),
            tokens_used,
            created_at,
            expires_at: created_at + ChronoDuration::days(CACHE_TTL_DAYS),
        };

        match self.bounded(self.store.upsert_entry(entry)).await {
            Ok(()) => {
                tracing::debug!(hash = hash.short(), model, tokens_used, "Cached analysis");
                true
            }
            Err(e) => {
                tracing::warn!(hash = hash.short(), error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Physically delete expired entries. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let deleted = self.bounded(self.store.delete_expired(Utc::now())).await?;
        tracing::info!(deleted, store = self.store.name(), "Purged expired cache entries");
        Ok(deleted)
    }

    /// Summary over all stored entries.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.bounded(self.store.list_entries()).await?;

        Ok(CacheStats {
            total_cached: entries.len() as u64,
            total_tokens_saved: entries.iter().map(|e| e.tokens_used as u64).sum(),
            oldest_entry: entries.iter().map(|e| e.created_at).min(),
            newest_entry: entries.iter().map(|e| e.created_at).max(),
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{entry, FailingStore};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use vigilent_core::{FlagType, LlmRedFlag, Severity};

    fn analysis() -> StructuredAnalysis {
        StructuredAnalysis {
            risk_score: 58,
            red_flags: vec![LlmRedFlag {
                flag_type: FlagType::ContractSplitting,
                severity: Severity::Medium,
                confidence: 0.55,
                explanation: "Three awards just below the threshold.".to_string(),
            }],
            summary: "Possible splitting.".to_string(),
            recommendations: vec![],
            similar_contracts_comparison: None,
        }
    }

    fn facts() -> ContractFacts {
        let mut facts = ContractFacts::new("CN-6006", "Office supplies lot 3", "Prefecture Dolj");
        facts.contract_value = Some(48_000.0);
        facts
    }

    fn memory_cache() -> (Arc<MemoryStore>, AnalysisCache) {
        let store = Arc::new(MemoryStore::default());
        let cache = AnalysisCache::new(store.clone(), Duration::from_secs(1));
        (store, cache)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_, cache) = memory_cache();
        let hash = AnalysisCache::hash(&facts());

        assert!(cache.get(&hash).await.is_none());
        assert!(cache.put(&hash, &analysis(), "deepseek/deepseek-chat", 1100).await);

        let cached = cache.get(&hash).await.unwrap();
        assert_eq!(cached.analysis, analysis());
        assert_eq!(cached.entry.model_used, "deepseek/deepseek-chat");
        assert_eq!(cached.entry.tokens_used, 1100);
        assert_eq!(
            cached.entry.expires_at - cached.entry.created_at,
            ChronoDuration::days(30)
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_until_purged() {
        let (store, cache) = memory_cache();
        let stale = entry("aa", 31, 900);
        let hash = stale.contract_hash.clone();
        store.upsert_entry(stale).await.unwrap();

        assert!(matches!(cache.lookup(&hash).await, CacheLookup::Miss));
        assert_eq!(cache.stats().await.unwrap().total_cached, 1);

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_invalid_payload_is_error_lookup() {
        let (store, cache) = memory_cache();
        let mut broken = entry("bb", 1, 10);
        broken.analysis = serde_json::json!({ "risk_score": "high" });
        let hash = broken.contract_hash.clone();
        store.upsert_entry(broken).await.unwrap();

        assert!(matches!(
            cache.lookup(&hash).await,
            CacheLookup::Error(CacheError::InvalidPayload(_))
        ));
        assert!(cache.get(&hash).await.is_none());
    }

    #[tokio::test]
    async fn test_failing_store_is_soft() {
        let cache = AnalysisCache::new(Arc::new(FailingStore), Duration::from_secs(1));
        let hash = AnalysisCache::hash(&facts());

        assert!(matches!(cache.lookup(&hash).await, CacheLookup::Error(CacheError::Store(_))));
        assert!(cache.get(&hash).await.is_none());
        assert!(!cache.put(&hash, &analysis(), "m", 1).await);
        assert!(cache.stats().await.is_err());
        assert!(cache.purge_expired().await.is_err());
    }

    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn get_entry(&self, _: &ContractHash) -> Result<Option<CacheEntry>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn upsert_entry(&self, _: CacheEntry) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_is_miss() {
        let cache = AnalysisCache::new(Arc::new(StalledStore), Duration::from_millis(200));
        let hash = AnalysisCache::hash(&facts());

        assert!(matches!(
            cache.lookup(&hash).await,
            CacheLookup::Error(CacheError::Timeout(_))
        ));
        assert!(!cache.put(&hash, &analysis(), "m", 1).await);
    }

    #[tokio::test]
    async fn test_stats_aggregate_entries() {
        let (store, cache) = memory_cache();
        let older = entry("c1", 10, 700);
        let newer = entry("c2", 1, 500);
        store.upsert_entry(older.clone()).await.unwrap();
        store.upsert_entry(newer.clone()).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_cached, 2);
        assert_eq!(stats.total_tokens_saved, 1200);
        assert_eq!(stats.oldest_entry, Some(older.created_at));
        assert_eq!(stats.newest_entry, Some(newer.created_at));
    }
}
