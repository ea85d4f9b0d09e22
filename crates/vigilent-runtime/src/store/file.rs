//! Record store persisted as a single JSON document.
//!
//! Every write replaces the document atomically (write to a uniquely named
//! sibling temporary file, then rename), so a crash never leaves a
//! half-written store behind. Writers in different processes are
//! last-write-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use vigilent_core::ContractHash;

use super::{CacheEntry, RecordStore, StoreError};

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    entries: BTreeMap<ContractHash, CacheEntry>,
}

/// JSON file store, used by the CLI so cached analyses survive restarts.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreDocument, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store writer failed: {e}")))?
    }
}

/// Write `bytes` to a uniquely named sibling temp file, then rename it over
/// `path`. Concurrent writers never share a temp file.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn get_entry(&self, hash: &ContractHash) -> Result<Option<CacheEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        Ok(document.entries.remove(hash))
    }

    async fn upsert_entry(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        document.entries.insert(entry.contract_hash.clone(), entry);
        self.save(&document).await
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        let total = document.entries.len();
        document.entries.retain(|_, entry| entry.expires_at >= before);
        let deleted = (total - document.entries.len()) as u64;

        if deleted > 0 {
            self.save(&document).await?;
        }
        Ok(deleted)
    }

    async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.entries.into_values().collect())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}
