use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::{DescriptionStore, EntryKey, TranslationEntry};
use crate::error::Result;

/// Read-through memory cache of exact lookups in front of another store.
///
/// Only hits are cached: a miss always goes to the backing store, so an entry created by
/// a concurrent writer is visible on the next lookup.
pub struct CachedStore {
    inner: Arc<dyn DescriptionStore>,
    cache: Cache<EntryKey, TranslationEntry>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn DescriptionStore>, max_entries: u64, ttl_seconds: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_seconds));
        }

        Self {
            inner,
            cache: builder.build(),
        }
    }
}

#[async_trait]
impl DescriptionStore for CachedStore {
    async fn get_exact(&self, canonical_text: &str) -> Result<Option<TranslationEntry>> {
        let key = EntryKey::for_text(canonical_text);
        if let Some(entry) = self.cache.get(&key).await {
            return Ok(Some(entry));
        }

        let found = self.inner.get_exact(canonical_text).await?;
        if let Some(ref entry) = found {
            self.cache.insert(key, entry.clone()).await;
        }
        Ok(found)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TranslationEntry>> {
        self.inner.search(query, limit).await
    }

    async fn insert(&self, entry: &TranslationEntry) -> Result<()> {
        self.inner.insert(entry).await?;
        self.cache.insert(entry.key(), entry.clone()).await;
        Ok(())
    }

    async fn update(&self, entry: &TranslationEntry) -> Result<()> {
        self.inner.update(entry).await?;
        // Re-read so the cached copy keeps the stored id
        self.cache.invalidate(&entry.key()).await;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TranslationEntry>> {
        self.inner.list().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await?;
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_hit_is_served_and_update_invalidates() {
        let backing = Arc::new(MemoryStore::new());
        let store = CachedStore::new(backing.clone(), 100, 0);

        store.insert(&TranslationEntry::new("Tiles", "ટાઇલ", None)).await.unwrap();
        assert_eq!(store.get_exact("Tiles").await.unwrap().unwrap().translated_text, "ટાઇલ");

        let mut edited = store.get_exact("Tiles").await.unwrap().unwrap();
        edited.translated_text = "ટાઇલ્સ".to_string();
        store.update(&edited).await.unwrap();

        assert_eq!(store.get_exact("Tiles").await.unwrap().unwrap().translated_text, "ટાઇલ્સ");
    }

    #[tokio::test]
    async fn test_miss_is_not_cached() {
        let backing = Arc::new(MemoryStore::new());
        let store = CachedStore::new(backing.clone(), 100, 0);

        assert!(store.get_exact("Grout").await.unwrap().is_none());
        backing.insert(&TranslationEntry::new("Grout", "ગ્રાઉટ", None)).await.unwrap();
        assert!(store.get_exact("Grout").await.unwrap().is_some());
    }
}
