//! Invoicer Core Library
//!
//! Bilingual (English / Gujarati) GST invoice authoring:
//! - Indian-grouped currency formatting and tax arithmetic
//! - Translation of line-item descriptions via OpenAI-compatible APIs, memoized in a
//!   description store (memory, sled, or both)
//! - The invoice document model and visual templates
//! - Projection of an invoice through a template into a visual tree
//! - Export to a single-page PDF, an editable document, previews and share links

pub mod bilingual;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod numeric;
pub mod render;
pub mod script;
pub mod session;
pub mod share;
pub mod store;
pub mod translator;
pub mod upload;
pub mod util;

pub use bilingual::{BilingualResolver, Debouncer, FieldResolution, Variants};
pub use config::{
    AppConfig, ExportConfig, Lang, Rgb, ShareConfig, StoreConfig, TranslatorConfig, UploadConfig,
    UploadMode, DEFAULT_MIXED_SCRIPT_LANG, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG,
};
pub use document::{
    Invoice, InvoiceRecord, ItemField, LineItem, Template, TemplateRecord, TemplateRegistry,
    TranslationRecord, generate_invoice_number,
};
pub use error::{Error, Result};
pub use export::{AssetPolicy, ExportPipeline, ExportedPdf, MarkupDocument, RasterImage, ShareOutcome};
pub use numeric::{
    CURRENCY_SYMBOL, GST_RATE, compute_tax, format_amount, format_currency, format_quantity,
    parse_formatted_number, to_target_script_digits,
};
pub use render::{PageSize, RenderOptions, VisualTree, project};
pub use session::{AuthoringSession, Command, ExportTicket};
pub use share::{build_share_message, whatsapp_url};
pub use store::{DescriptionStore, TranslationEntry, open_store};
pub use translator::{OpenAiTranslator, Translator, create_translator};
pub use upload::{Uploader, create_uploader};
pub use util::clear_description_store;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.source_lang.as_str(), "en");
        assert_eq!(config.target_lang.as_str(), "gu");
        assert!((config.tax_rate - GST_RATE).abs() < f64::EPSILON);
    }
}
