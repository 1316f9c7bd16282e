use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{DescriptionStore, EntryKey, TranslationEntry, missing_entry, rank_matches};
use crate::error::{Error, Result};

/// Process-local description store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<EntryKey, TranslationEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DescriptionStore for MemoryStore {
    async fn get_exact(&self, canonical_text: &str) -> Result<Option<TranslationEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&EntryKey::for_text(canonical_text)).cloned())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TranslationEntry>> {
        let entries = self.entries.read().await;
        Ok(rank_matches(entries.values().cloned(), query, limit))
    }

    async fn insert(&self, entry: &TranslationEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.entry(entry.key()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(Error::PersistenceConflict(entry.canonical_text.clone()))
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, entry: &TranslationEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        let existing = entries
            .get_mut(&entry.key())
            .ok_or_else(|| missing_entry(&entry.canonical_text))?;
        existing.translated_text.clone_from(&entry.translated_text);
        existing.mixed_script_text.clone_from(&entry.mixed_script_text);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TranslationEntry>> {
        let entries = self.entries.read().await;
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.canonical_text.cmp(&b.canonical_text));
        Ok(all)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
