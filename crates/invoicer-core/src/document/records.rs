//! Storage-boundary records.
//!
//! The hosted datastore uses snake_case keys (and its own names for tax and translation
//! fields). Each record converts to and from its in-memory counterpart; every persisted field
//! maps to exactly one model field. Derived amounts are written for readers of the raw data
//! but recomputed on the way back in.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Invoice, LineItem};
use super::template::{
    Colors, CompanyProfile, FooterDesign, Position, Template, Toggles, Watermark,
};
use crate::config::Rgb;
use crate::error::{Error, Result};
use crate::store::TranslationEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvoiceItemRecord {
    pub id: String,
    pub position: usize,
    pub description: String,
    pub gujarati_description: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub rate: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvoiceRecord {
    pub id: String,
    pub invoice_number: String,
    pub party_name: String,
    pub date: NaiveDate,
    pub items: Vec<InvoiceItemRecord>,
    pub show_gst: bool,
    pub gst_rate: f64,
    pub subtotal: f64,
    pub gst_amount: f64,
    pub total_amount: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn no_items() -> Error {
    Error::InvariantViolation("an invoice record needs at least one line item".to_string())
}

impl TryFrom<&Invoice> for InvoiceRecord {
    type Error = Error;

    fn try_from(invoice: &Invoice) -> Result<Self> {
        if invoice.items().is_empty() {
            return Err(no_items());
        }

        let items = invoice
            .items()
            .iter()
            .enumerate()
            .map(|(position, item)| InvoiceItemRecord {
                id: item.id.clone(),
                position,
                description: item.description.clone(),
                gujarati_description: item.translated_description.clone(),
                quantity: item.quantity(),
                unit: item.unit.clone(),
                rate: item.rate(),
                total: item.total(),
            })
            .collect();

        Ok(Self {
            id: invoice.id().to_string(),
            invoice_number: invoice.invoice_number().to_string(),
            party_name: invoice.party_name().to_string(),
            date: invoice.date(),
            items,
            show_gst: invoice.tax_enabled(),
            gst_rate: invoice.tax_rate(),
            subtotal: invoice.subtotal(),
            gst_amount: invoice.tax(),
            total_amount: invoice.total(),
            tags: invoice.tags().iter().cloned().collect(),
            created_at: invoice.created_at(),
            updated_at: invoice.updated_at(),
        })
    }
}

impl TryFrom<InvoiceRecord> for Invoice {
    type Error = Error;

    fn try_from(record: InvoiceRecord) -> Result<Self> {
        if record.items.is_empty() {
            return Err(no_items());
        }

        let mut rows = record.items;
        rows.sort_by_key(|row| row.position);

        let items = rows
            .into_iter()
            .map(|row| {
                let mut item = LineItem::with_values(row.description, row.quantity, row.unit, row.rate)?;
                item.id = row.id;
                item.translated_description = row.gujarati_description;
                Ok(item)
            })
            .collect::<Result<Vec<_>>>()?;

        Self {
            id: record.id,
            invoice_number: record.invoice_number,
            party_name: record.party_name,
            date: record.date,
            items,
            subtotal: 0.0,
            tax_enabled: record.show_gst,
            tax_rate: record.gst_rate,
            tax: 0.0,
            total: 0.0,
            tags: record.tags.into_iter().collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
        .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    pub primary_color: Rgb,
    pub secondary_color: Rgb,
    pub table_background_color: Rgb,
    pub header_position: String,
    pub footer_design: String,
    pub footer_position: String,
    pub show_footer: bool,
    pub watermark_text: String,
    pub show_watermark: bool,
    pub show_gst: bool,
    pub show_contact: bool,
    pub show_logo: bool,
    pub company_name: String,
    pub company_address: String,
    pub company_mobile: String,
    pub company_gst: String,
    pub logo_url: Option<String>,
}

impl From<&Template> for TemplateRecord {
    fn from(t: &Template) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            primary_color: t.colors.primary,
            secondary_color: t.colors.secondary,
            table_background_color: t.colors.table_background,
            header_position: t.header_position.as_str().to_string(),
            footer_design: t.footer_design.as_str().to_string(),
            footer_position: t.footer_position.as_str().to_string(),
            show_footer: t.footer_enabled,
            watermark_text: t.watermark.text.clone(),
            show_watermark: t.watermark.enabled,
            show_gst: t.toggles.show_tax,
            show_contact: t.toggles.show_contact,
            show_logo: t.toggles.show_logo,
            company_name: t.company_profile.name.clone(),
            company_address: t.company_profile.address.clone(),
            company_mobile: t.company_profile.mobile.clone(),
            company_gst: t.company_profile.tax_id.clone(),
            logo_url: t.logo_url.clone(),
        }
    }
}

impl TryFrom<TemplateRecord> for Template {
    type Error = Error;

    /// Fails only on layout names the model does not know
    fn try_from(r: TemplateRecord) -> Result<Self> {
        Ok(Self {
            id: r.id,
            name: r.name,
            colors: Colors {
                primary: r.primary_color,
                secondary: r.secondary_color,
                table_background: r.table_background_color,
            },
            header_position: Position::parse(&r.header_position)?,
            footer_design: FooterDesign::parse(&r.footer_design)?,
            footer_position: Position::parse(&r.footer_position)?,
            footer_enabled: r.show_footer,
            watermark: Watermark {
                text: r.watermark_text,
                enabled: r.show_watermark,
            },
            toggles: Toggles {
                show_tax: r.show_gst,
                show_contact: r.show_contact,
                show_logo: r.show_logo,
            },
            company_profile: CompanyProfile {
                name: r.company_name,
                address: r.company_address,
                mobile: r.company_mobile,
                tax_id: r.company_gst,
            },
            logo_url: r.logo_url,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TranslationRecord {
    pub id: String,
    pub english_text: String,
    pub gujarati_text: String,
    pub ginlish_text: Option<String>,
}

impl From<TranslationEntry> for TranslationRecord {
    fn from(e: TranslationEntry) -> Self {
        Self {
            id: e.id,
            english_text: e.canonical_text,
            gujarati_text: e.translated_text,
            ginlish_text: e.mixed_script_text,
        }
    }
}

impl From<TranslationRecord> for TranslationEntry {
    fn from(r: TranslationRecord) -> Self {
        Self {
            id: r.id,
            canonical_text: r.english_text,
            translated_text: r.gujarati_text,
            mixed_script_text: r.ginlish_text,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::document::model::ItemField;

    fn sample_invoice() -> Invoice {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let mut inv = Invoice::new("INV-7", "Acme", date, Utc::now());
        inv.update_item(0, ItemField::Description("Tiles".into())).unwrap();
        inv.update_item(0, ItemField::TranslatedDescription(Some("ટાઇલ્સ".into())))
            .unwrap();
        inv.update_item(0, ItemField::Rate(100.0)).unwrap();
        let i = inv.add_item();
        inv.update_item(i, ItemField::Quantity(2.5)).unwrap();
        inv.update_item(i, ItemField::Rate(40.0)).unwrap();
        inv.set_tax_enabled(true);
        inv.add_tag("site-a");
        inv
    }

    #[test]
    fn test_invoice_record_keys() {
        let record = InvoiceRecord::try_from(&sample_invoice()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["show_gst"], true);
        assert_eq!(json["gst_rate"], 18.0);
        assert_eq!(json["subtotal"], 200.0);
        assert_eq!(json["gst_amount"], 36.0);
        assert_eq!(json["total_amount"], 236.0);
        assert_eq!(json["party_name"], "Acme");
        assert_eq!(json["items"][0]["gujarati_description"], "ટાઇલ્સ");
        assert_eq!(json["items"][1]["position"], 1);
    }

    #[test]
    fn test_invoice_round_trip() {
        let invoice = sample_invoice();
        let record = InvoiceRecord::try_from(&invoice).unwrap();
        let back = Invoice::try_from(record).unwrap();
        assert_eq!(back, invoice);
    }

    #[test]
    fn test_stored_totals_are_recomputed() {
        let mut record = InvoiceRecord::try_from(&sample_invoice()).unwrap();
        record.total_amount = 1.0;
        record.items[0].total = 999.0;
        let back = Invoice::try_from(record).unwrap();
        assert_eq!(back.items()[0].total(), 100.0);
        assert_eq!(back.total(), 236.0);
    }

    #[test]
    fn test_items_ordered_by_position() {
        let mut record = InvoiceRecord::try_from(&sample_invoice()).unwrap();
        record.items.reverse();
        let back = Invoice::try_from(record).unwrap();
        assert_eq!(back.items()[0].description, "Tiles");
    }

    #[test]
    fn test_zero_items_rejected() {
        let mut record = InvoiceRecord::try_from(&sample_invoice()).unwrap();
        record.items.clear();
        assert!(matches!(Invoice::try_from(record), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_template_round_trip() {
        let mut template = Template::named("Bold");
        template.header_position = Position::Right;
        template.footer_design = FooterDesign::Minimal;
        template.toggles.show_tax = false;
        template.company_profile.tax_id = "24ABCDE1234F1Z5".to_string();

        let record = TemplateRecord::from(&template);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["header_position"], "right");
        assert_eq!(json["show_gst"], false);
        assert_eq!(json["company_gst"], "24ABCDE1234F1Z5");

        assert_eq!(Template::try_from(record).unwrap(), template);
    }

    #[test]
    fn test_translation_record_names() {
        let entry = TranslationEntry::new("Tiles", "ટાઇલ્સ", Some("tiles".into()));
        let record = TranslationRecord::from(entry.clone());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["gujarati_text"], "ટાઇલ્સ");
        assert_eq!(json["ginlish_text"], "tiles");
        assert_eq!(TranslationEntry::from(record), entry);
    }
}
