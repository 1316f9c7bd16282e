//! Askama templates for the two HTML pages.
//!
//! - `base.html` - Common layout and styles
//! - `index.html` - Landing page: start a session from a template
//! - `session.html` - Invoice summary with export links
//!
//! Editing happens through the JSON API; these pages only display state.

use askama::Template;
use askama_web::WebTemplate;
use invoicer_core::{Invoice, LineItem, format_amount, format_currency, format_quantity};

use crate::state::Session;

/// Template choice on the landing page
pub struct TemplateOption {
    pub id: String,
    pub name: String,
}

/// Landing page.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub templates: Vec<TemplateOption>,
    pub session_count: usize,
}

/// One display row of the items table
pub struct ItemRow {
    pub number: usize,
    pub description: String,
    pub translated: Option<String>,
    pub quantity: String,
    pub rate: String,
    pub amount: String,
}

impl ItemRow {
    fn of(number: usize, item: &LineItem) -> Self {
        Self {
            number,
            description: item.description.clone(),
            translated: item.translated_description.clone(),
            quantity: format_quantity(item.quantity(), &item.unit)
                .unwrap_or_else(|_| item.quantity().to_string()),
            rate: display_amount(item.rate()),
            amount: display_amount(item.total()),
        }
    }
}

/// Session summary page.
#[derive(Template, WebTemplate)]
#[template(path = "session.html")]
pub struct SessionTemplate {
    pub session_id: String,
    pub invoice_number: String,
    pub party_name: String,
    pub date: String,
    pub template_name: String,
    pub revision: u64,
    pub rows: Vec<ItemRow>,
    pub subtotal: String,
    /// `(rate label, amount)` when GST applies
    pub tax: Option<(String, String)>,
    pub total: String,
    pub tags: Vec<String>,
}

impl SessionTemplate {
    pub fn of(session_id: &str, session: &Session) -> Self {
        let authoring = &session.authoring;
        let invoice: &Invoice = authoring.invoice();

        Self {
            session_id: session_id.to_string(),
            invoice_number: invoice.invoice_number().to_string(),
            party_name: invoice.party_name().to_string(),
            date: invoice.date().format("%d/%m/%Y").to_string(),
            template_name: authoring.template().name.clone(),
            revision: authoring.revision(),
            rows: invoice
                .items()
                .iter()
                .enumerate()
                .map(|(i, item)| ItemRow::of(i + 1, item))
                .collect(),
            subtotal: display_amount(invoice.subtotal()),
            tax: invoice.tax_enabled().then(|| {
                (
                    format!("GST {}%", invoice.tax_rate()),
                    display_amount(invoice.tax()),
                )
            }),
            total: format_currency(invoice.total())
                .unwrap_or_else(|_| display_amount(invoice.total())),
            tags: invoice.tags().iter().cloned().collect(),
        }
    }
}

/// Amounts are finite by construction; fall back to plain formatting otherwise
fn display_amount(value: f64) -> String {
    format_amount(value).unwrap_or_else(|_| format!("{value:.2}"))
}
