use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use tracing::{debug, warn};

use super::{DescriptionStore, EntryKey, TranslationEntry, missing_entry, rank_matches};
use crate::error::{Error, Result};

/// On-disk description store using sled.
///
/// Values are JSON-encoded entries keyed by [`EntryKey`]. Uniqueness of canonical text is
/// enforced with compare-and-swap, so concurrent creators cannot both succeed; updates retry
/// their compare-and-swap until they apply on top of the latest stored value.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreInit(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::StoreInit(format!(
                    "Description store locked at {}\n\n\
                    Another process is using the store, or a previous instance crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::StoreInit(format!("Failed to open store at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened description store at {}", path.display());

        Ok(Self { db })
    }

    fn encode(entry: &TranslationEntry) -> Result<Vec<u8>> {
        serde_json::to_vec(entry).map_err(|e| Error::Store(format!("encode entry: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<TranslationEntry> {
        serde_json::from_slice(bytes).map_err(|e| Error::Store(format!("decode entry: {e}")))
    }

    /// Decode every stored entry, skipping (and logging) corrupt values
    fn entries(&self) -> Result<Vec<TranslationEntry>> {
        let mut entries = Vec::with_capacity(self.db.len());
        for item in self.db.iter() {
            let (_, value) = item.map_err(|e| Error::Store(e.to_string()))?;
            match Self::decode(&value) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
        Ok(entries)
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Store(format!("Flush failed: {e}")))?;
        Ok(())
    }

    /// Remove every entry synchronously, returning how many there were
    pub fn purge(&self) -> Result<usize> {
        let count = self.db.len();
        self.db.clear().map_err(|e| Error::Store(format!("Clear failed: {e}")))?;
        self.db
            .flush()
            .map_err(|e| Error::Store(format!("Flush failed: {e}")))?;
        Ok(count)
    }
}

#[async_trait]
impl DescriptionStore for SledStore {
    async fn get_exact(&self, canonical_text: &str) -> Result<Option<TranslationEntry>> {
        let key = EntryKey::for_text(canonical_text);
        match self.db.get(key.as_str().as_bytes()) {
            Ok(Some(value)) => Self::decode(&value).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TranslationEntry>> {
        Ok(rank_matches(self.entries()?, query, limit))
    }

    async fn insert(&self, entry: &TranslationEntry) -> Result<()> {
        let key = entry.key();
        let value = Self::encode(entry)?;

        let swapped = self
            .db
            .compare_and_swap(key.as_str().as_bytes(), None::<&[u8]>, Some(value))
            .map_err(|e| Error::Store(e.to_string()))?;

        if swapped.is_err() {
            return Err(Error::PersistenceConflict(entry.canonical_text.clone()));
        }

        self.flush().await
    }

    async fn update(&self, entry: &TranslationEntry) -> Result<()> {
        let key = entry.key();
        let key = key.as_str().as_bytes();

        // Re-read and retry when another writer got in between
        loop {
            let current = self
                .db
                .get(key)
                .map_err(|e| Error::Store(e.to_string()))?
                .ok_or_else(|| missing_entry(&entry.canonical_text))?;

            let mut merged = Self::decode(&current)?;
            merged.translated_text.clone_from(&entry.translated_text);
            merged.mixed_script_text.clone_from(&entry.mixed_script_text);

            let swapped = self
                .db
                .compare_and_swap(key, Some(current), Some(Self::encode(&merged)?))
                .map_err(|e| Error::Store(e.to_string()))?;

            if swapped.is_ok() {
                break;
            }
            debug!("Entry {:?} changed during update, retrying", entry.canonical_text);
        }

        self.flush().await
    }

    async fn list(&self) -> Result<Vec<TranslationEntry>> {
        let mut entries = self.entries()?;
        entries.sort_by(|a, b| a.canonical_text.cmp(&b.canonical_text));
        Ok(entries)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.db.len())
    }

    async fn clear(&self) -> Result<()> {
        self.db.clear().map_err(|e| Error::Store(e.to_string()))?;
        self.flush().await
    }
}
