//! Description store: the memoization cache of translated line-item descriptions.
//!
//! At most one entry exists per canonical text. The constraint is enforced by the store
//! (`insert` fails with [`Error::PersistenceConflict`]); callers that lose a creation race
//! re-read the winning entry.

mod cached;
mod disk;
mod key;
mod memory;

pub use cached::CachedStore;
pub use disk::SledStore;
pub use key::EntryKey;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// A canonical description with its translations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub id: String,
    pub canonical_text: String,
    pub translated_text: String,
    #[serde(default)]
    pub mixed_script_text: Option<String>,
}

impl TranslationEntry {
    pub fn new(
        canonical_text: impl Into<String>,
        translated_text: impl Into<String>,
        mixed_script_text: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            canonical_text: canonical_text.into(),
            translated_text: translated_text.into(),
            mixed_script_text,
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::for_text(&self.canonical_text)
    }

    /// Case-insensitive substring match against every representation.
    /// `query` must already be lowercase.
    fn matches(&self, query: &str) -> bool {
        self.canonical_text.to_lowercase().contains(query)
            || self.translated_text.to_lowercase().contains(query)
            || self
                .mixed_script_text
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(query))
    }
}

/// Persistent store of translation entries
#[async_trait]
pub trait DescriptionStore: Send + Sync {
    /// Exact, case-sensitive lookup by canonical text
    async fn get_exact(&self, canonical_text: &str) -> Result<Option<TranslationEntry>>;

    /// Fuzzy substring suggestions, at most `limit` entries
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TranslationEntry>>;

    /// Insert a new entry; fails with `PersistenceConflict` if the canonical text exists
    async fn insert(&self, entry: &TranslationEntry) -> Result<()>;

    /// Replace the translations of an existing entry (matched by canonical text)
    async fn update(&self, entry: &TranslationEntry) -> Result<()>;

    /// All entries, ordered by canonical text
    async fn list(&self) -> Result<Vec<TranslationEntry>>;

    /// Number of stored entries
    async fn len(&self) -> Result<usize>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;
}

/// Filter and rank suggestions: canonical-prefix matches first, then alphabetical.
pub(crate) fn rank_matches(
    entries: impl IntoIterator<Item = TranslationEntry>,
    query: &str,
    limit: usize,
) -> Vec<TranslationEntry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut matches: Vec<TranslationEntry> =
        entries.into_iter().filter(|e| e.matches(&query)).collect();

    matches.sort_by(|a, b| {
        let a_prefix = a.canonical_text.to_lowercase().starts_with(&query);
        let b_prefix = b.canonical_text.to_lowercase().starts_with(&query);
        b_prefix
            .cmp(&a_prefix)
            .then_with(|| a.canonical_text.cmp(&b.canonical_text))
    });
    matches.truncate(limit);
    matches
}

pub(crate) fn missing_entry(canonical_text: &str) -> Error {
    Error::Store(format!("no entry for {canonical_text:?}"))
}

/// Open the description store described by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DescriptionStore>> {
    let base: Arc<dyn DescriptionStore> = if config.disk_enabled {
        let path = config
            .disk_path
            .clone()
            .unwrap_or_else(crate::util::description_store_path);
        Arc::new(SledStore::new(path)?)
    } else {
        Arc::new(MemoryStore::new())
    };

    if config.memory_enabled {
        Ok(Arc::new(CachedStore::new(
            base,
            config.memory_max_entries,
            config.memory_ttl_seconds,
        )))
    } else {
        Ok(base)
    }
}
