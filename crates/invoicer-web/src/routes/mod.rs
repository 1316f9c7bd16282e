//! HTTP route handlers for the invoicer web application.
//!
//! JSON routes live under `/api`; the two HTML pages use Askama templates from the
//! `templates` module. Export routes return binary bodies (PDF, Word document, WebP).

mod export;
mod pages;
mod sessions;
mod templates;
mod translate;

pub use export::{export_doc, export_pdf, preview, share};
pub use pages::{index, session_page};
pub use sessions::{apply_commands, create_session, get_record, get_session, translate_item};
pub use templates::{list_templates, replace_templates};
pub use translate::{suggest, translate};

use chrono::{DateTime, Utc};
use invoicer_core::{AppConfig, Command, Invoice, RenderOptions};
use serde::{Deserialize, Serialize};

use crate::state::Session;

/// Body of `POST /api/sessions`
#[derive(Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub invoice: Option<Invoice>,
}

/// One command or a batch applied atomically
#[derive(Deserialize)]
#[serde(untagged)]
pub enum CommandBatch {
    One(Command),
    Many(Vec<Command>),
}

/// JSON snapshot of a session
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub revision: u64,
    pub template_id: String,
    pub exporting: bool,
    pub invoice: Invoice,
}

impl SessionView {
    pub fn of(session_id: &str, session: &Session) -> Self {
        let authoring = &session.authoring;
        Self {
            session_id: session_id.to_string(),
            revision: authoring.revision(),
            template_id: authoring.template().id.clone(),
            exporting: authoring.is_exporting(),
            invoice: authoring.invoice().clone(),
        }
    }
}

/// Query params shared by the export routes
#[derive(Deserialize, Default)]
pub struct ExportQuery {
    /// Print numbers with target-script digits
    #[serde(default)]
    pub target_digits: Option<bool>,
    /// Print translated descriptions under the canonical ones
    #[serde(default)]
    pub bilingual: Option<bool>,
    /// Maximum preview width in pixels
    #[serde(default)]
    pub width: Option<u32>,
}

impl ExportQuery {
    pub fn render_options(&self, config: &AppConfig, now: DateTime<Utc>) -> RenderOptions {
        let mut options =
            RenderOptions::from_config(&config.export).generated_on(now.date_naive());
        if let Some(digits) = self.target_digits {
            options.target_script_digits = digits;
        }
        if let Some(bilingual) = self.bilingual {
            options.bilingual_descriptions = bilingual;
        }
        options
    }
}

/// Body of `POST /api/sessions/{id}/share`
#[derive(Deserialize, Default)]
pub struct ShareRequest {
    /// Overrides the configured message template
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /api/translate`
#[derive(Deserialize)]
pub struct TranslateRequest {
    pub text: String,
}

/// Query params for suggestions
#[derive(Deserialize)]
pub struct SuggestQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `<invoice number>.<extension>`, restricted to filename-safe characters
pub fn download_name(invoice_number: &str, extension: &str) -> String {
    let stem: String = invoice_number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    let stem = if stem.is_empty() { "invoice" } else { &stem };
    format!("{stem}.{extension}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("INV-20240316-a1b2", "pdf"), "INV-20240316-a1b2.pdf");
        assert_eq!(download_name("\"../x\"", "doc"), "x.doc");
        assert_eq!(download_name("", "pdf"), "invoice.pdf");
    }

    #[test]
    fn test_command_batch_accepts_one_or_many() {
        let one: CommandBatch = serde_json::from_str(r#"{"type":"add_item"}"#).unwrap();
        assert!(matches!(one, CommandBatch::One(Command::AddItem)));

        let many: CommandBatch = serde_json::from_str(
            r#"[{"type":"add_item"},{"type":"set_tax_enabled","value":true}]"#,
        )
        .unwrap();
        assert!(matches!(many, CommandBatch::Many(ref v) if v.len() == 2));
    }
}
