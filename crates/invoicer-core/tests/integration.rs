//! Integration tests for invoicer-core
//!
//! These tests exercise the authoring workflow end to end:
//! - Description resolution with a mock translation backend
//! - Conflict-tolerant creation under concurrency
//! - Editing through an authoring session
//! - Rendering, export and sharing

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use invoicer_core::{
    AppConfig, AuthoringSession, BilingualResolver, Command, DescriptionStore, Error,
    ExportPipeline, FieldResolution, Invoice, InvoiceRecord, ItemField, Lang, RenderOptions,
    Result, TemplateRegistry, Translator, build_share_message, format_currency,
    share::ShareVariables,
    store::{CachedStore, MemoryStore, SledStore},
    translator::TranslatorInfo,
};

// =============================================================================
// Mock Translator for Testing
// =============================================================================

/// Predictable translations without network calls.
struct MockTranslator {
    delay: Duration,
    should_fail: bool,
    calls: AtomicUsize,
}

impl MockTranslator {
    fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            should_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "mock",
            requires_api_key: false,
            supports_transliteration: true,
        }
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            return Err(Error::TranslationRequest("Mock translation failure".to_string()));
        }
        Ok(match (source.as_str(), target.as_str(), text) {
            ("en", "gu", "Tiles fitting") => "ટાઇલ્સ ફિટિંગ".to_string(),
            ("gu", "en", "ટાઇલ્સ ફિટિંગ") => "Tiles fitting".to_string(),
            (_, "gu-Latn", _) => "tiles fitting".to_string(),
            (_, target, text) => format!("[{target}] {text}"),
        })
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 16, 10, 0, 0).unwrap()
}

fn resolver(translator: Arc<MockTranslator>, store: Arc<dyn DescriptionStore>) -> BilingualResolver {
    BilingualResolver::new(translator, store, &AppConfig::default())
}

fn session() -> AuthoringSession {
    AuthoringSession::new(
        Invoice::new("INV-001", "Mehta Builders", date(), now()),
        TemplateRegistry::new(),
    )
}

fn set(index: usize, field: ItemField) -> Command {
    Command::UpdateItem { index, field }
}

// =============================================================================
// Description resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_or_create_memoizes() {
    let translator = Arc::new(MockTranslator::new());
    let store: Arc<dyn DescriptionStore> = Arc::new(MemoryStore::new());
    let resolver = resolver(translator.clone(), store.clone());

    let first = resolver.resolve_or_create("Tiles fitting").await.unwrap();
    let second = resolver.resolve_or_create("  Tiles fitting ").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.translated_text, "ટાઇલ્સ ફિટિંગ");
    assert_eq!(translator.calls(), 1);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_resolve_yields_one_entry() {
    let translator = Arc::new(MockTranslator::slow(Duration::from_millis(50)));
    let store: Arc<dyn DescriptionStore> = Arc::new(MemoryStore::new());
    let resolver = resolver(translator.clone(), store.clone());

    let (a, b) = futures::join!(
        resolver.resolve_or_create("Tiles fitting"),
        resolver.resolve_or_create("Tiles fitting"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.id, b.id);
    assert_eq!(translator.calls(), 2);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_resolve_on_cached_sled_store() {
    let dir = tempfile::tempdir().unwrap();
    let sled = Arc::new(SledStore::new(dir.path().join("descriptions")).unwrap());
    let store: Arc<dyn DescriptionStore> = Arc::new(CachedStore::new(sled, 100, 60));
    let resolver = Arc::new(resolver(
        Arc::new(MockTranslator::slow(Duration::from_millis(20))),
        store.clone(),
    ));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve_or_create("Grouting").await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_target_script_input_is_back_filled() {
    let store: Arc<dyn DescriptionStore> = Arc::new(MemoryStore::new());
    let resolver = resolver(Arc::new(MockTranslator::new()), store.clone());

    let variants = resolver.resolve_all_variants("ટાઇલ્સ ફિટિંગ").await.unwrap();
    assert_eq!(variants.canonical, "Tiles fitting");
    assert_eq!(variants.translated, "ટાઇલ્સ ફિટિંગ");
    assert_eq!(variants.mixed_script.as_deref(), Some("tiles fitting"));

    let stored = store.get_exact("Tiles fitting").await.unwrap().unwrap();
    assert_eq!(stored.mixed_script_text.as_deref(), Some("tiles fitting"));
}

#[tokio::test]
async fn test_typed_target_script_becomes_translation() {
    let store: Arc<dyn DescriptionStore> = Arc::new(MemoryStore::new());
    let resolver = resolver(Arc::new(MockTranslator::new()), store);

    let mut session = session();
    session
        .apply(set(0, ItemField::Description("ટાઇલ્સ ફિટિંગ".into())), now())
        .unwrap();

    let resolution = resolver.resolve_for_field("ટાઇલ્સ ફિટિંગ").await.unwrap();
    assert_eq!(session.apply_resolution(0, &resolution, now()).unwrap(), None);

    let item = &session.invoice().items()[0];
    assert_eq!(item.description, "Tiles fitting");
    assert_eq!(item.translated_description.as_deref(), Some("ટાઇલ્સ ફિટિંગ"));

    let tree = session.render(&RenderOptions::default()).unwrap();
    let doc = invoicer_core::export::to_simple_document(&tree).unwrap();
    assert!(doc.html.contains("Tiles fitting"));
    assert!(doc.html.contains("ટાઇલ્સ ફિટિંગ"));
}

#[tokio::test]
async fn test_translation_failure_degrades_field() {
    let store: Arc<dyn DescriptionStore> = Arc::new(MemoryStore::new());
    let resolver = resolver(Arc::new(MockTranslator::failing()), store.clone());

    let resolution = resolver.resolve_for_field("Tiles fitting").await.unwrap();
    let FieldResolution::Degraded { canonical, .. } = &resolution else {
        panic!("expected degraded resolution, got {resolution:?}");
    };
    assert_eq!(canonical, "Tiles fitting");
    assert_eq!(store.len().await.unwrap(), 0);

    let mut session = session();
    session
        .apply(set(0, ItemField::Description("Tiles fitting".into())), now())
        .unwrap();
    let warning = session.apply_resolution(0, &resolution, now()).unwrap();
    assert!(warning.is_some());
    assert_eq!(session.invoice().items()[0].description, "Tiles fitting");
    assert!(session.invoice().items()[0].translated_description.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_translation_times_out_and_degrades() {
    let store: Arc<dyn DescriptionStore> = Arc::new(MemoryStore::new());
    let resolver = resolver(Arc::new(MockTranslator::slow(Duration::from_secs(120))), store)
        .with_deadline(Duration::from_secs(30));

    let resolution = resolver.resolve_for_field("Tiles fitting").await.unwrap();
    assert!(matches!(resolution, FieldResolution::Degraded { .. }));
}

// =============================================================================
// Authoring scenarios
// =============================================================================

#[test]
fn test_tiles_scenario_totals() {
    let mut session = session();
    session
        .apply_all(
            vec![
                set(0, ItemField::Description("Tiles fitting".into())),
                set(0, ItemField::Unit("sft".into())),
                set(0, ItemField::Quantity(4950.0)),
                set(0, ItemField::Rate(33.33)),
            ],
            now(),
        )
        .unwrap();

    let invoice = session.invoice();
    assert!((invoice.items()[0].total() - 164_983.5).abs() < 1e-6);
    assert!((invoice.subtotal() - 164_983.5).abs() < 1e-6);
    assert_eq!(format_currency(invoice.subtotal()).unwrap(), "₹1,64,983.50");
}

#[test]
fn test_gst_scenario_totals() {
    let mut session = session();
    session
        .apply_all(
            vec![
                set(0, ItemField::Quantity(1.0)),
                set(0, ItemField::Rate(165_000.0)),
                Command::SetTaxEnabled { value: true },
            ],
            now(),
        )
        .unwrap();

    let invoice = session.invoice();
    assert!((invoice.tax() - 29_700.0).abs() < 1e-6);
    assert!((invoice.total() - 194_700.0).abs() < 1e-6);
    assert_eq!(format_currency(invoice.total()).unwrap(), "₹1,94,700.00");

    session
        .apply(Command::SetTaxEnabled { value: false }, now())
        .unwrap();
    assert!((session.invoice().total() - 165_000.0).abs() < 1e-6);
}

#[test]
fn test_share_message_scenario() {
    let mut session = session();
    session
        .apply(set(0, ItemField::Rate(194_700.0)), now())
        .unwrap();

    let variables =
        ShareVariables::for_invoice(session.invoice(), "https://files.example/inv.pdf").unwrap();
    let message = build_share_message(
        "Dear {{client_name}}, invoice {{invoice_number}} of {{total_amount}}: {{invoice_link}} {{signature}}",
        &variables.into_map(),
    );
    assert_eq!(
        message,
        "Dear Mehta Builders, invoice INV-001 of ₹1,94,700.00: https://files.example/inv.pdf {{signature}}"
    );
}

#[test]
fn test_record_round_trip_recomputes() {
    let mut session = session();
    session
        .apply_all(
            vec![
                set(0, ItemField::Quantity(2.0)),
                set(0, ItemField::Rate(500.0)),
                Command::AddItem,
                set(1, ItemField::Rate(250.0)),
                Command::SetTaxEnabled { value: true },
            ],
            now(),
        )
        .unwrap();

    let record = InvoiceRecord::try_from(session.invoice()).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["show_gst"], true);
    assert_eq!(json["total_amount"], 1475.0);

    let restored = Invoice::try_from(record).unwrap();
    assert_eq!(&restored, session.invoice());
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn test_tall_invoice_exports_to_single_page() {
    let mut session = session();
    let mut commands = vec![set(0, ItemField::Description("Item 0".into()))];
    for i in 1..80 {
        commands.push(Command::AddItem);
        commands.push(set(i, ItemField::Description(format!("Item {i}"))));
        commands.push(set(i, ItemField::Rate(100.0)));
    }
    session.apply_all(commands, now()).unwrap();

    let mut config = AppConfig::default();
    config.export.render_scale = 1.0;
    let pipeline = ExportPipeline::new(&config, None).unwrap();

    let tree = session.render(&RenderOptions::default()).unwrap();
    let raster = pipeline.capture(&tree).await.unwrap();
    assert_eq!(raster.width(), 595);
    assert!(raster.height() > 842);

    let _ticket = session.begin_export().unwrap();
    let pdf = pipeline.export_pdf(&tree).await.unwrap();
    assert_eq!(pdf.page_count, 1);
    assert!((pdf.placement.height - 841.89).abs() < 0.01);
    assert!(pdf.placement.x > 0.0);
    assert!(matches!(session.begin_export(), Err(Error::ExportInProgress)));
}

#[test]
fn test_markup_document_keeps_both_languages() {
    let mut session = session();
    session
        .apply_all(
            vec![
                set(0, ItemField::Description("Tiles fitting".into())),
                set(0, ItemField::TranslatedDescription(Some("ટાઇલ્સ ફિટિંગ".into()))),
            ],
            now(),
        )
        .unwrap();

    let tree = session.render(&RenderOptions::default()).unwrap();
    let doc = invoicer_core::export::to_simple_document(&tree).unwrap();
    assert!(doc.html.contains("Tiles fitting"));
    assert!(doc.html.contains("ટાઇલ્સ ફિટિંગ"));
    assert!(doc.html.contains("Mehta Builders"));
}
