use async_trait::async_trait;
use crate::config::Lang;
use crate::error::Result;

/// Information about a translation backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether this backend needs an API key
    pub requires_api_key: bool,
    /// Whether the backend can produce Latin-letter transliterations (`gu-Latn`)
    pub supports_transliteration: bool,
}

/// External translation service.
///
/// Treated as unreliable and possibly slow: callers wrap calls in a timeout and
/// degrade to manual entry on failure.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate `text` from `source` to `target`
    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String>;
}
