use thiserror::Error;

/// Unified error type for invoicer-core
///
/// Contract violations (`InvalidNumber`, `IndexOutOfRange`, `InvariantViolation`,
/// `AssetRejected`) indicate a caller bug and are returned as-is. Translation and upload failures
/// are operational and are expected to be caught at the UI boundary. Export failures abort only
/// the export in progress.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Contract Errors
    // ==========================================================================
    /// Non-finite or malformed numeric input
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// Item mutation on an index outside the item list
    #[error("index {index} out of range (document has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Operation would break a model invariant (e.g. removing the last line item)
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Image source outside what the export pipeline is allowed to read
    #[error("asset rejected: {0}")]
    AssetRejected(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation service unreachable or unusable
    #[error("translation unavailable: {0}")]
    TranslationUnavailable(String),

    /// Translation API request failed
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Invalid response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// Translation request timed out
    #[error("translation request timed out after {0} seconds")]
    TranslationTimeout(u64),

    // ==========================================================================
    // Store Errors
    // ==========================================================================
    /// Unique-constraint race on translation entry creation
    #[error("translation entry for {0:?} already exists")]
    PersistenceConflict(String),

    /// Failed to open the description store
    #[error("failed to open description store: {0}")]
    StoreInit(String),

    /// Failed to read or write the description store
    #[error("description store error: {0}")]
    Store(String),

    // ==========================================================================
    // Export Errors
    // ==========================================================================
    /// Rasterization or PDF assembly failed
    #[error("export failed: {0}")]
    ExportFailure(String),

    /// Another export is still running for this session
    #[error("an export is already in progress")]
    ExportInProgress,

    /// Upload of an exported artifact failed
    #[error("upload failed: {0}")]
    UploadFailure(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error comes from the external translation service.
    ///
    /// These are recoverable: the caller keeps the canonical text and carries on.
    pub const fn is_translation_failure(&self) -> bool {
        matches!(
            self,
            Self::TranslationUnavailable(_)
                | Self::TranslationRequest(_)
                | Self::TranslationInvalidResponse(_)
                | Self::TranslationRateLimited { .. }
                | Self::TranslationTimeout(_)
        )
    }

    /// Whether this error is a programmer-contract violation.
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidNumber(_)
                | Self::IndexOutOfRange { .. }
                | Self::InvariantViolation(_)
                | Self::AssetRejected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_failures_are_classified() {
        assert!(Error::TranslationTimeout(30).is_translation_failure());
        assert!(Error::TranslationRateLimited { retry_after: None }.is_translation_failure());
        assert!(!Error::UploadFailure("x".into()).is_translation_failure());
    }

    #[test]
    fn test_rate_limit_message() {
        let err = Error::TranslationRateLimited { retry_after: Some(7) };
        assert_eq!(err.to_string(), "translation rate limited, retry after 7 seconds");
    }

    #[test]
    fn test_contract_violations() {
        assert!(Error::IndexOutOfRange { index: 3, len: 1 }.is_contract_violation());
        assert!(!Error::ExportInProgress.is_contract_violation());
    }
}
