//! In-memory record store backed by moka.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;

use vigilent_core::ContractHash;

use super::{CacheEntry, RecordStore, StoreError};

/// Bounded in-memory store. Contents are lost on exit.
///
/// Expiry is not delegated to moka: entries stay until purged, so the
/// analysis cache sees the same expiry semantics as with a persistent store.
pub struct MemoryStore {
    entries: Cache<ContractHash, CacheEntry>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_entry(&self, hash: &ContractHash) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.get(hash).await)
    }

    async fn upsert_entry(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.entries
            .insert(entry.contract_hash.clone(), entry)
            .await;
        Ok(())
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let stale: Vec<ContractHash> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at < before)
            .map(|(hash, _)| (*hash).clone())
            .collect();

        for hash in &stale {
            self.entries.invalidate(hash).await;
        }
        Ok(stale.len() as u64)
    }

    async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
        Ok(self.entries.iter().map(|(_, entry)| entry).collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
