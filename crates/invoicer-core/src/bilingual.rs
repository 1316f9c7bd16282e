//! Bilingual description resolution.
//!
//! Given the text a user typed for a line item, find the cached translation or obtain a new
//! one from the translation service and remember it. Creation is insert-then-reselect: if
//! another caller stored the same canonical text first, the insert fails with
//! `PersistenceConflict` and the winner's entry is returned instead.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, Lang};
use crate::error::{Error, Result};
use crate::script::is_target_script;
use crate::store::{DescriptionStore, TranslationEntry};
use crate::translator::Translator;

/// The three parallel representations of a description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variants {
    pub canonical: String,
    pub translated: String,
    pub mixed_script: Option<String>,
}

impl From<TranslationEntry> for Variants {
    fn from(entry: TranslationEntry) -> Self {
        Self {
            canonical: entry.canonical_text,
            translated: entry.translated_text,
            mixed_script: entry.mixed_script_text,
        }
    }
}

/// Outcome of resolving a description at the editing boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldResolution {
    /// Translation found or created
    Resolved { variants: Variants },
    /// Translation service unavailable; the canonical text is kept as typed
    Degraded { canonical: String, warning: String },
}

impl FieldResolution {
    pub fn canonical(&self) -> &str {
        match self {
            Self::Resolved { variants } => &variants.canonical,
            Self::Degraded { canonical, .. } => canonical,
        }
    }
}

/// Resolves and memoizes translations of line-item descriptions
pub struct BilingualResolver {
    translator: Arc<dyn Translator>,
    store: Arc<dyn DescriptionStore>,
    source: Lang,
    target: Lang,
    mixed: Lang,
    deadline: Duration,
}

impl BilingualResolver {
    pub fn new(
        translator: Arc<dyn Translator>,
        store: Arc<dyn DescriptionStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            translator,
            store,
            source: config.source_lang.clone(),
            target: config.target_lang.clone(),
            mixed: config.mixed_script_lang.clone(),
            deadline: Duration::from_secs(config.translator.timeout_secs),
        }
    }

    /// Override the translation deadline
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn store(&self) -> &Arc<dyn DescriptionStore> {
        &self.store
    }

    /// Exact-match cache lookup
    pub async fn lookup_exact(&self, text: &str) -> Result<Option<TranslationEntry>> {
        self.store.get_exact(text.trim()).await
    }

    /// Autocomplete suggestions. Callers debounce (see [`Debouncer`]).
    pub async fn search_similar(&self, query: &str, limit: usize) -> Result<Vec<TranslationEntry>> {
        self.store.search(query, limit).await
    }

    /// Return the stored entry for `text`, translating and storing it on a miss.
    pub async fn resolve_or_create(&self, text: &str) -> Result<TranslationEntry> {
        let canonical = normalized(text)?;

        if let Some(entry) = self.store.get_exact(canonical).await? {
            debug!("Description cache hit for {:?}", canonical);
            return Ok(entry);
        }

        info!("Translating new description {:?} with {}", canonical, self.translator.name());
        let translated = self.translate(canonical, &self.source, &self.target).await?;

        self.create(TranslationEntry::new(canonical, translated, None)).await
    }

    /// Resolve all three representations of `text`.
    ///
    /// Target-script input is back-filled (target → canonical, target → mixed); anything
    /// else is treated as canonical and forward-translated.
    pub async fn resolve_all_variants(&self, text: &str) -> Result<Variants> {
        let input = normalized(text)?;

        if is_target_script(input) {
            debug!("Input {:?} is target-script, back-filling", input);
            let canonical = self.translate(input, &self.target, &self.source).await?;

            if let Some(entry) = self.store.get_exact(&canonical).await? {
                return Ok(entry.into());
            }

            let mixed = self.optional_translate(input, &self.target).await;
            let entry = TranslationEntry::new(canonical, input, mixed);
            return self.create(entry).await.map(Variants::from);
        }

        if let Some(entry) = self.store.get_exact(input).await? {
            if entry.mixed_script_text.is_some() {
                return Ok(entry.into());
            }

            // Older entry without the transliteration: fill it in
            let mut entry = entry;
            entry.mixed_script_text = self.optional_translate(input, &self.source).await;
            if entry.mixed_script_text.is_some() {
                self.store.update(&entry).await?;
            }
            return Ok(entry.into());
        }

        let translated = self.translate(input, &self.source, &self.target).await?;
        let mixed = self.optional_translate(input, &self.source).await;
        let entry = TranslationEntry::new(input, translated, mixed);
        self.create(entry).await.map(Variants::from)
    }

    /// UI-boundary wrapper: translation failures degrade to manual entry instead of erroring.
    pub async fn resolve_for_field(&self, text: &str) -> Result<FieldResolution> {
        match self.resolve_all_variants(text).await {
            Ok(variants) => Ok(FieldResolution::Resolved { variants }),
            Err(e) if e.is_translation_failure() => {
                warn!("Translation unavailable for {:?}: {}", text, e);
                Ok(FieldResolution::Degraded {
                    canonical: text.to_string(),
                    warning: format!("Translation unavailable, enter it manually ({e})"),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Insert `entry`; on a uniqueness conflict return the entry that won.
    async fn create(&self, entry: TranslationEntry) -> Result<TranslationEntry> {
        match self.store.insert(&entry).await {
            Ok(()) => Ok(entry),
            Err(Error::PersistenceConflict(canonical)) => {
                debug!("Lost creation race for {:?}, re-reading", canonical);
                self.store
                    .get_exact(&canonical)
                    .await?
                    .ok_or(Error::PersistenceConflict(canonical))
            }
            Err(e) => Err(e),
        }
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        let translated = timeout(self.deadline, self.translator.translate(text, source, target))
            .await
            .map_err(|_| Error::TranslationTimeout(self.deadline.as_secs()))??;

        let translated = translated.trim();
        if translated.is_empty() {
            return Err(Error::TranslationUnavailable("empty translation".to_string()));
        }
        Ok(translated.to_string())
    }

    /// Mixed-script rendering is best effort: a failure leaves it empty.
    async fn optional_translate(&self, text: &str, source: &Lang) -> Option<String> {
        match self.translate(text, source, &self.mixed).await {
            Ok(mixed) => Some(mixed),
            Err(e) => {
                warn!("Mixed-script rendering failed for {:?}: {}", text, e);
                None
            }
        }
    }
}

fn normalized(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvariantViolation("description is empty".to_string()));
    }
    Ok(trimmed)
}

/// Caller-side debounce for autocomplete lookups.
///
/// `should_fire` returns true only once the input has been stable for the window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_input: Option<(String, Instant)>,
    fired: Option<String>,
}

impl Debouncer {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_input: None,
            fired: None,
        }
    }

    /// Record a keystroke
    pub fn input(&mut self, text: &str, now: Instant) {
        self.last_input = Some((text.to_string(), now));
    }

    /// The query to send now, if the window has elapsed and it was not sent already
    pub fn should_fire(&mut self, now: Instant) -> Option<String> {
        let (text, at) = self.last_input.as_ref()?;
        if now.duration_since(*at) < self.window || self.fired.as_ref() == Some(text) {
            return None;
        }
        self.fired = Some(text.clone());
        Some(text.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_waits_for_quiet_period() {
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        let start = Instant::now();

        debouncer.input("ti", start);
        debouncer.input("til", start + Duration::from_millis(100));
        assert_eq!(debouncer.should_fire(start + Duration::from_millis(200)), None);
        assert_eq!(
            debouncer.should_fire(start + Duration::from_millis(450)),
            Some("til".to_string())
        );
        // Same query is not sent twice
        assert_eq!(debouncer.should_fire(start + Duration::from_millis(900)), None);
    }

    #[test]
    fn test_normalized_rejects_blank() {
        assert!(normalized("   ").is_err());
        assert_eq!(normalized("  Tiles ").unwrap(), "Tiles");
    }

    #[test]
    fn test_field_resolution_canonical() {
        let degraded = FieldResolution::Degraded {
            canonical: "Tiles".to_string(),
            warning: "offline".to_string(),
        };
        assert_eq!(degraded.canonical(), "Tiles");
    }
}
