//! Invoice and line-item model.
//!
//! Derived amounts (`LineItem::total`, `Invoice::subtotal/tax/total`) are private and
//! recomputed eagerly after every mutation, so reading them can never observe a stale value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::numeric::{GST_RATE, compute_tax};

/// Unit used for new line items
pub const DEFAULT_UNIT: &str = "pcs";

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validate a user-supplied quantity or rate
fn non_negative(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::InvalidNumber(format!("{field} must be finite, got {value}")));
    }
    if value < 0.0 {
        return Err(Error::InvalidNumber(format!("{field} must not be negative, got {value}")));
    }
    Ok(value)
}

/// One row of an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "LineItemInput")]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub translated_description: Option<String>,
    quantity: f64,
    pub unit: String,
    rate: f64,
    total: f64,
}

/// Wire form of a line item; `total` is accepted and ignored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineItemInput {
    #[serde(default = "new_id")]
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    translated_description: Option<String>,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default = "default_unit")]
    unit: String,
    #[serde(default)]
    rate: f64,
}

const fn default_quantity() -> f64 {
    1.0
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

impl TryFrom<LineItemInput> for LineItem {
    type Error = Error;

    fn try_from(input: LineItemInput) -> Result<Self> {
        let mut item = Self {
            id: input.id,
            description: input.description,
            translated_description: input.translated_description,
            quantity: non_negative("quantity", input.quantity)?,
            unit: input.unit,
            rate: non_negative("rate", input.rate)?,
            total: 0.0,
        };
        item.recompute();
        Ok(item)
    }
}

impl Default for LineItem {
    fn default() -> Self {
        Self {
            id: new_id(),
            description: String::new(),
            translated_description: None,
            quantity: 1.0,
            unit: DEFAULT_UNIT.to_string(),
            rate: 0.0,
            total: 0.0,
        }
    }
}

impl LineItem {
    /// A fresh row: quantity 1, rate 0, unit "pcs"
    pub fn new() -> Self {
        Self::default()
    }

    /// A row with values, validated
    pub fn with_values(
        description: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        rate: f64,
    ) -> Result<Self> {
        let mut item = Self {
            description: description.into(),
            quantity: non_negative("quantity", quantity)?,
            unit: unit.into(),
            rate: non_negative("rate", rate)?,
            ..Self::default()
        };
        item.recompute();
        Ok(item)
    }

    #[must_use]
    pub fn with_translation(mut self, translated: impl Into<String>) -> Self {
        self.translated_description = Some(translated.into());
        self
    }

    pub const fn quantity(&self) -> f64 {
        self.quantity
    }

    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// `quantity × rate`
    pub const fn total(&self) -> f64 {
        self.total
    }

    fn recompute(&mut self) {
        self.total = self.quantity * self.rate;
    }
}

/// A single field edit on a line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ItemField {
    Description(String),
    TranslatedDescription(Option<String>),
    Quantity(f64),
    Unit(String),
    Rate(f64),
}

/// An invoice or quotation being authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "InvoiceInput")]
pub struct Invoice {
    pub(crate) id: String,
    pub(crate) invoice_number: String,
    pub(crate) party_name: String,
    pub(crate) date: NaiveDate,
    pub(crate) items: Vec<LineItem>,
    pub(crate) subtotal: f64,
    pub(crate) tax_enabled: bool,
    pub(crate) tax_rate: f64,
    pub(crate) tax: f64,
    pub(crate) total: f64,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Wire form of an invoice; derived amounts are accepted and ignored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceInput {
    #[serde(default = "new_id")]
    id: String,
    invoice_number: String,
    #[serde(default)]
    party_name: String,
    date: NaiveDate,
    items: Vec<LineItem>,
    #[serde(default)]
    tax_enabled: bool,
    #[serde(default = "default_tax_rate")]
    tax_rate: f64,
    #[serde(default)]
    tags: BTreeSet<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

const fn default_tax_rate() -> f64 {
    GST_RATE
}

impl TryFrom<InvoiceInput> for Invoice {
    type Error = Error;

    fn try_from(input: InvoiceInput) -> Result<Self> {
        let created_at = input.created_at.unwrap_or_else(Utc::now);
        Self {
            id: input.id,
            invoice_number: input.invoice_number,
            party_name: input.party_name,
            date: input.date,
            items: input.items,
            subtotal: 0.0,
            tax_enabled: input.tax_enabled,
            tax_rate: input.tax_rate,
            tax: 0.0,
            total: 0.0,
            tags: input.tags,
            created_at,
            updated_at: input.updated_at.unwrap_or(created_at),
        }
        .finish()
    }
}

impl Invoice {
    /// A new invoice with one empty line item
    pub fn new(
        invoice_number: impl Into<String>,
        party_name: impl Into<String>,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let mut invoice = Self {
            id: new_id(),
            invoice_number: invoice_number.into(),
            party_name: party_name.into(),
            date,
            items: vec![LineItem::new()],
            subtotal: 0.0,
            tax_enabled: false,
            tax_rate: GST_RATE,
            tax: 0.0,
            total: 0.0,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        invoice.recompute_totals();
        invoice
    }

    /// Validate an assembled invoice and compute its derived fields
    pub(crate) fn finish(mut self) -> Result<Self> {
        if self.items.is_empty() {
            return Err(Error::InvariantViolation(
                "an invoice needs at least one line item".to_string(),
            ));
        }
        non_negative("tax rate", self.tax_rate)?;
        for item in &mut self.items {
            non_negative("quantity", item.quantity)?;
            non_negative("rate", item.rate)?;
            item.recompute();
        }
        self.recompute_totals();
        Ok(self)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn party_name(&self) -> &str {
        &self.party_name
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub const fn tax_enabled(&self) -> bool {
        self.tax_enabled
    }

    pub const fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    pub const fn subtotal(&self) -> f64 {
        self.subtotal
    }

    pub const fn tax(&self) -> f64 {
        self.tax
    }

    pub const fn total(&self) -> f64 {
        self.total
    }

    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ---------------------------------------------------------------------
    // Item operations
    // ---------------------------------------------------------------------

    /// Append a default line item, returning its index
    pub fn add_item(&mut self) -> usize {
        self.items.push(LineItem::new());
        self.recompute_totals();
        self.items.len() - 1
    }

    /// Append a prepared line item, returning its index
    pub fn push_item(&mut self, item: LineItem) -> usize {
        self.items.push(item);
        self.recompute_totals();
        self.items.len() - 1
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    /// Edit one field of one item. Quantity and rate edits recompute totals.
    pub fn update_item(&mut self, index: usize, field: ItemField) -> Result<()> {
        self.check_index(index)?;

        // Validate before touching the item so a rejected edit changes nothing
        let field = match field {
            ItemField::Quantity(q) => ItemField::Quantity(non_negative("quantity", q)?),
            ItemField::Rate(r) => ItemField::Rate(non_negative("rate", r)?),
            other => other,
        };

        let item = &mut self.items[index];
        match field {
            ItemField::Description(text) => item.description = text,
            ItemField::TranslatedDescription(text) => item.translated_description = text,
            ItemField::Unit(unit) => item.unit = unit,
            ItemField::Quantity(quantity) => {
                item.quantity = quantity;
                item.recompute();
                self.recompute_totals();
            }
            ItemField::Rate(rate) => {
                item.rate = rate;
                item.recompute();
                self.recompute_totals();
            }
        }
        Ok(())
    }

    /// Remove an item. The last remaining item cannot be removed.
    pub fn remove_item(&mut self, index: usize) -> Result<LineItem> {
        self.check_index(index)?;
        if self.items.len() == 1 {
            return Err(Error::InvariantViolation(
                "cannot remove the last line item".to_string(),
            ));
        }
        let removed = self.items.remove(index);
        self.recompute_totals();
        Ok(removed)
    }

    /// Move the item at `from` to position `to`, keeping the order of the others
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);
        }
        Ok(())
    }

    /// Recompute subtotal, tax and total from the items. Idempotent.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.items.iter().map(LineItem::total).sum();
        self.tax = if self.tax_enabled {
            compute_tax(self.subtotal, self.tax_rate)
        } else {
            0.0
        };
        self.total = self.subtotal + self.tax;
    }

    // ---------------------------------------------------------------------
    // Header fields
    // ---------------------------------------------------------------------

    pub fn set_invoice_number(&mut self, number: impl Into<String>) {
        self.invoice_number = number.into();
    }

    pub fn set_party_name(&mut self, name: impl Into<String>) {
        self.party_name = name.into();
    }

    pub const fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
    }

    pub fn set_tax_enabled(&mut self, enabled: bool) {
        self.tax_enabled = enabled;
        self.recompute_totals();
    }

    pub fn set_tax_rate(&mut self, rate_percent: f64) -> Result<()> {
        self.tax_rate = non_negative("tax rate", rate_percent)?;
        self.recompute_totals();
        Ok(())
    }

    /// Add a tag; returns false if it was already present or blank
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        !tag.is_empty() && self.tags.insert(tag.to_string())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag.trim())
    }

    /// Record a modification time
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Check the invariants required before handing the invoice to persistence
    pub fn validate_for_save(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::InvariantViolation(
                "an invoice needs at least one line item".to_string(),
            ));
        }
        if self.invoice_number.trim().is_empty() {
            return Err(Error::InvariantViolation("invoice number is empty".to_string()));
        }
        Ok(())
    }
}

/// Client-side invoice number: `INV-<yyyymmdd>-<4 hex>`. Not guaranteed unique.
pub fn generate_invoice_number(date: NaiveDate) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("INV-{}-{}", date.format("%Y%m%d"), &suffix[..4].to_uppercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn invoice() -> Invoice {
        Invoice::new("INV-1", "Acme Builders", date(), Utc::now())
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{a} != {b}");
    }

    #[test]
    fn test_new_invoice_has_one_default_item() {
        let inv = invoice();
        assert_eq!(inv.items().len(), 1);
        let item = &inv.items()[0];
        assert_eq!(item.quantity(), 1.0);
        assert_eq!(item.rate(), 0.0);
        assert_eq!(item.total(), 0.0);
        assert_eq!(item.unit, "pcs");
        assert_eq!(inv.total(), 0.0);
    }

    #[test]
    fn test_sft_scenario_not_rounded() {
        let mut inv = invoice();
        inv.update_item(0, ItemField::Unit("sft".into())).unwrap();
        inv.update_item(0, ItemField::Quantity(4950.0)).unwrap();
        inv.update_item(0, ItemField::Rate(33.33)).unwrap();
        assert_close(inv.items()[0].total(), 164_983.5);
        assert_close(inv.subtotal(), 164_983.5);
    }

    #[test]
    fn test_gst_scenario() {
        let mut inv = invoice();
        inv.update_item(0, ItemField::Quantity(1.0)).unwrap();
        inv.update_item(0, ItemField::Rate(165_000.0)).unwrap();
        inv.set_tax_enabled(true);
        assert_eq!(inv.tax(), 29_700.0);
        assert_eq!(inv.total(), 194_700.0);

        inv.set_tax_enabled(false);
        assert_eq!(inv.tax(), 0.0);
        assert_eq!(inv.total(), 165_000.0);
    }

    #[test]
    fn test_update_out_of_range() {
        let mut inv = invoice();
        let err = inv.update_item(3, ItemField::Rate(1.0)).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 3, len: 1 }));
    }

    #[test]
    fn test_invalid_number_leaves_item_unchanged() {
        let mut inv = invoice();
        inv.update_item(0, ItemField::Rate(10.0)).unwrap();
        let before = inv.clone();
        assert!(matches!(
            inv.update_item(0, ItemField::Quantity(f64::NAN)),
            Err(Error::InvalidNumber(_))
        ));
        assert!(matches!(
            inv.update_item(0, ItemField::Rate(-1.0)),
            Err(Error::InvalidNumber(_))
        ));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_description_edit_does_not_touch_totals() {
        let mut inv = invoice();
        inv.update_item(0, ItemField::Rate(50.0)).unwrap();
        inv.update_item(0, ItemField::Description("Tiles fitting".into())).unwrap();
        inv.update_item(0, ItemField::TranslatedDescription(Some("ટાઇલ્સ ફિટિંગ".into())))
            .unwrap();
        assert_eq!(inv.items()[0].description, "Tiles fitting");
        assert_eq!(inv.total(), 50.0);
    }

    #[test]
    fn test_remove_last_item_fails_and_leaves_document() {
        let mut inv = invoice();
        let before = inv.clone();
        let err = inv.remove_item(0).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_remove_recomputes() {
        let mut inv = invoice();
        inv.update_item(0, ItemField::Rate(10.0)).unwrap();
        let i = inv.add_item();
        inv.update_item(i, ItemField::Rate(5.0)).unwrap();
        assert_eq!(inv.subtotal(), 15.0);
        inv.remove_item(0).unwrap();
        assert_eq!(inv.subtotal(), 5.0);
    }

    #[test]
    fn test_reorder_is_splice() {
        let mut inv = invoice();
        for name in ["b", "c", "d"] {
            let i = inv.add_item();
            inv.update_item(i, ItemField::Description(name.into())).unwrap();
        }
        inv.update_item(0, ItemField::Description("a".into())).unwrap();

        inv.reorder(0, 2).unwrap();
        let order: Vec<_> = inv.items().iter().map(|i| i.description.as_str()).collect();
        assert_eq!(order, ["b", "c", "a", "d"]);

        inv.reorder(3, 0).unwrap();
        let order: Vec<_> = inv.items().iter().map(|i| i.description.as_str()).collect();
        assert_eq!(order, ["d", "b", "c", "a"]);

        assert!(matches!(inv.reorder(0, 4), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut inv = invoice();
        inv.update_item(0, ItemField::Rate(99.5)).unwrap();
        inv.set_tax_enabled(true);
        let before = inv.clone();
        inv.recompute_totals();
        inv.recompute_totals();
        assert_eq!(inv, before);
    }

    #[test]
    fn test_tags() {
        let mut inv = invoice();
        assert!(inv.add_tag(" site-a "));
        assert!(!inv.add_tag("site-a"));
        assert!(!inv.add_tag("  "));
        assert!(inv.remove_tag("site-a"));
        assert!(inv.tags().is_empty());
    }

    #[test]
    fn test_deserialize_ignores_stale_totals() {
        let json = serde_json::json!({
            "invoiceNumber": "INV-9",
            "partyName": "Acme",
            "date": "2024-03-15",
            "taxEnabled": true,
            "items": [
                { "description": "Tiles", "quantity": 2.0, "unit": "box", "rate": 100.0, "total": 1.0 }
            ],
            "subtotal": 5.0,
            "total": 5.0
        });
        let inv: Invoice = serde_json::from_value(json).unwrap();
        assert_eq!(inv.items()[0].total(), 200.0);
        assert_eq!(inv.subtotal(), 200.0);
        assert_eq!(inv.tax(), 36.0);
        assert_eq!(inv.total(), 236.0);
    }

    #[test]
    fn test_deserialize_rejects_empty_items() {
        let json = serde_json::json!({
            "invoiceNumber": "INV-9",
            "date": "2024-03-15",
            "items": []
        });
        assert!(serde_json::from_value::<Invoice>(json).is_err());
    }

    #[test]
    fn test_generated_number_format() {
        let number = generate_invoice_number(date());
        assert!(number.starts_with("INV-20240315-"));
        assert_eq!(number.len(), "INV-20240315-".len() + 4);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Quantity(usize, f64),
        Rate(usize, f64),
        Remove(usize),
        Reorder(usize, usize),
        Tax(bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Add),
            (0usize..8, 0.0f64..10_000.0).prop_map(|(i, q)| Op::Quantity(i, q)),
            (0usize..8, 0.0f64..100_000.0).prop_map(|(i, r)| Op::Rate(i, r)),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8, 0usize..8).prop_map(|(a, b)| Op::Reorder(a, b)),
            any::<bool>().prop_map(Op::Tax),
        ]
    }

    proptest! {
        #[test]
        fn subtotal_matches_items_after_any_sequence(ops in prop::collection::vec(op(), 0..40)) {
            let mut inv = invoice();
            for op in ops {
                // Out-of-range and last-item errors are expected; they must not corrupt state
                let _ = match op {
                    Op::Add => { inv.add_item(); Ok(()) }
                    Op::Quantity(i, q) => inv.update_item(i, ItemField::Quantity(q)),
                    Op::Rate(i, r) => inv.update_item(i, ItemField::Rate(r)),
                    Op::Remove(i) => inv.remove_item(i).map(|_| ()),
                    Op::Reorder(a, b) => inv.reorder(a, b),
                    Op::Tax(on) => { inv.set_tax_enabled(on); Ok(()) }
                };

                let expected: f64 = inv.items().iter().map(|i| i.quantity() * i.rate()).sum();
                prop_assert_eq!(inv.subtotal(), expected);
                prop_assert!(!inv.items().is_empty());
                let tax = if inv.tax_enabled() { compute_tax(expected, inv.tax_rate()) } else { 0.0 };
                prop_assert_eq!(inv.total(), expected + tax);
            }
        }
    }
}
