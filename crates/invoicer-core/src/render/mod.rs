//! Projection of an invoice and a template into a printable visual tree.
//!
//! `project` is pure: everything that could vary between runs (digit script, currency glyph,
//! the "generated on" date) arrives through [`RenderOptions`]. Sections a template disables are
//! left out of the tree entirely, so export only ever sees what should be printed.

mod footer;
mod header;
mod tree;

pub use tree::{
    Align, Cell, Column, ImageRef, Node, PT_PER_MM, PageSize, SectionKind, Table, TableCell, Text,
    Viewport, VisualTree, WatermarkMark,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{ExportConfig, Rgb};
use crate::document::{Invoice, Template};
use crate::error::Result;
use crate::numeric::{format_amount, format_currency, format_quantity, to_target_script_digits};

/// Date format printed on documents
pub const DATE_FORMAT: &str = "%d-%m-%Y";

const BODY_PT: f32 = 9.5;
const LABEL_PT: f32 = 8.5;

/// Explicit inputs to projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Width of the editing surface, in millimetres
    pub viewport_width_mm: f32,
    /// Prefix amounts with the currency glyph
    pub currency_symbol: bool,
    /// Print numbers with target-script digits
    pub target_script_digits: bool,
    /// Print translated descriptions under the canonical ones
    pub bilingual_descriptions: bool,
    /// Date printed in the footer, if any
    pub generated_on: Option<NaiveDate>,
    /// Overrides the "INVOICE" / "TAX INVOICE" heading
    pub title: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport_width_mm: Viewport::default().width_mm,
            currency_symbol: true,
            target_script_digits: false,
            bilingual_descriptions: true,
            generated_on: None,
            title: None,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            currency_symbol: config.currency_symbol,
            target_script_digits: config.target_script_digits,
            bilingual_descriptions: config.bilingual_descriptions,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn generated_on(mut self, date: NaiveDate) -> Self {
        self.generated_on = Some(date);
        self
    }
}

/// Shared state for the layout functions
pub(crate) struct Context<'a> {
    pub invoice: &'a Invoice,
    pub template: &'a Template,
    pub options: &'a RenderOptions,
    pub title: String,
}

impl Context<'_> {
    pub fn digits(&self, text: String) -> String {
        if self.options.target_script_digits {
            to_target_script_digits(&text)
        } else {
            text
        }
    }

    pub fn money(&self, amount: f64) -> Result<String> {
        let text = if self.options.currency_symbol {
            format_currency(amount)?
        } else {
            format_amount(amount)?
        };
        Ok(self.digits(text))
    }

    pub fn date(&self, date: NaiveDate) -> String {
        self.digits(date.format(DATE_FORMAT).to_string())
    }

    pub fn generated_on(&self) -> Option<String> {
        self.options
            .generated_on
            .map(|d| format!("Generated on {}", self.date(d)))
    }

    pub const fn primary(&self) -> Rgb {
        self.template.colors.primary
    }

    pub const fn secondary(&self) -> Rgb {
        self.template.colors.secondary
    }

    /// Logo node, when the template enables it and has one
    pub fn logo(&self, align: Align) -> Option<Node> {
        if !self.template.toggles.show_logo {
            return None;
        }
        let source = self.template.logo_url.as_deref()?.trim();
        if source.is_empty() {
            return None;
        }
        Some(Node::section(
            SectionKind::Logo,
            vec![Node::Image(ImageRef {
                source: source.to_string(),
                width_mm: 28.0,
                height_mm: 16.0,
                align,
            })],
        ))
    }
}

/// Project an invoice through a template into a visual tree
pub fn project(
    invoice: &Invoice,
    template: &Template,
    options: &RenderOptions,
) -> Result<VisualTree> {
    let title = options.title.clone().unwrap_or_else(|| {
        if invoice.tax_enabled() { "TAX INVOICE" } else { "INVOICE" }.to_string()
    });

    let ctx = Context {
        invoice,
        template,
        options,
        title,
    };

    let mut nodes = vec![
        header::layout(&ctx),
        Node::Rule {
            color: ctx.primary(),
            thickness_pt: 1.5,
        },
        Node::Spacer { height_mm: 3.0 },
        party(&ctx),
        Node::Spacer { height_mm: 4.0 },
        items(&ctx)?,
        Node::Spacer { height_mm: 2.0 },
        totals(&ctx)?,
    ];

    if template.toggles.show_contact {
        nodes.push(Node::Spacer { height_mm: 4.0 });
        nodes.push(contact(&ctx));
    }

    if template.footer_enabled {
        nodes.push(Node::Spacer { height_mm: 6.0 });
        nodes.push(footer::layout(&ctx));
    }

    let watermark = (template.watermark.enabled && !template.watermark.text.trim().is_empty())
        .then(|| WatermarkMark {
            text: template.watermark.text.trim().to_string(),
            color: template.colors.table_background,
        });

    Ok(VisualTree {
        viewport: Viewport {
            width_mm: options.viewport_width_mm,
            height_mm: Viewport::default().height_mm,
        },
        title: ctx.title,
        background: Rgb::white(),
        watermark,
        nodes,
    })
}

fn party(ctx: &Context<'_>) -> Node {
    let label = |s: &str| Text::new(s, LABEL_PT, ctx.secondary());
    let invoice = ctx.invoice;

    Node::section(
        SectionKind::Party,
        vec![Node::row([
            (
                1.0,
                vec![
                    Node::Text(label("Bill To")),
                    Node::Text(Text::new(invoice.party_name(), 11.0, Rgb::black()).bold()),
                ],
            ),
            (
                1.0,
                vec![
                    Node::Text(
                        label(&format!("Invoice No: {}", invoice.invoice_number()))
                            .aligned(Align::Right),
                    ),
                    Node::Text(
                        label(&format!("Date: {}", ctx.date(invoice.date()))).aligned(Align::Right),
                    ),
                ],
            ),
        ])],
    )
}

fn items(ctx: &Context<'_>) -> Result<Node> {
    let column = |title: &str, weight: f32, align: Align| Column {
        title: title.to_string(),
        weight,
        align,
    };

    let columns = vec![
        column("#", 0.4, Align::Center),
        column("Description", 4.0, Align::Left),
        column("Qty", 1.0, Align::Right),
        column("Unit", 0.8, Align::Center),
        column("Rate", 1.4, Align::Right),
        column("Amount", 1.6, Align::Right),
    ];

    let mut rows = Vec::with_capacity(ctx.invoice.items().len());
    for (i, item) in ctx.invoice.items().iter().enumerate() {
        let secondary = ctx
            .options
            .bilingual_descriptions
            .then(|| item.translated_description.clone())
            .flatten()
            .filter(|t| !t.trim().is_empty() && *t != item.description);

        rows.push(vec![
            TableCell::text(ctx.digits((i + 1).to_string())),
            TableCell {
                primary: item.description.clone(),
                secondary,
            },
            TableCell::text(ctx.digits(format_quantity(item.quantity(), &item.unit)?)),
            TableCell::text(item.unit.clone()),
            TableCell::text(ctx.money(item.rate())?),
            TableCell::text(ctx.money(item.total())?),
        ]);
    }

    Ok(Node::section(
        SectionKind::Items,
        vec![Node::Table(Table {
            columns,
            rows,
            header_background: ctx.primary(),
            header_color: Rgb::white(),
            body_background: ctx.template.colors.table_background,
            text_color: Rgb::black(),
            font_size_pt: BODY_PT,
        })],
    ))
}

fn totals(ctx: &Context<'_>) -> Result<Node> {
    let invoice = ctx.invoice;
    let mut labels = vec![Node::Text(
        Text::new("Subtotal", BODY_PT, ctx.secondary()).aligned(Align::Right),
    )];
    let mut values = vec![Node::Text(
        Text::new(ctx.money(invoice.subtotal())?, BODY_PT, Rgb::black()).aligned(Align::Right),
    )];

    if invoice.tax_enabled() && ctx.template.toggles.show_tax {
        let rate = ctx.digits(format_quantity(invoice.tax_rate(), "%")?);
        labels.push(Node::Text(
            Text::new(format!("GST @ {rate}%"), BODY_PT, ctx.secondary()).aligned(Align::Right),
        ));
        values.push(Node::Text(
            Text::new(ctx.money(invoice.tax())?, BODY_PT, Rgb::black()).aligned(Align::Right),
        ));
    }

    labels.push(Node::Text(
        Text::new("Total", 11.0, ctx.primary()).bold().aligned(Align::Right),
    ));
    values.push(Node::Text(
        Text::new(ctx.money(invoice.total())?, 11.0, ctx.primary())
            .bold()
            .aligned(Align::Right),
    ));

    Ok(Node::section(
        SectionKind::Totals,
        vec![Node::row([(3.0, Vec::new()), (1.4, labels), (1.6, values)])],
    ))
}

fn contact(ctx: &Context<'_>) -> Node {
    let profile = &ctx.template.company_profile;
    let mut lines = Vec::new();

    if !profile.mobile.trim().is_empty() {
        lines.push(format!("Mobile: {}", ctx.digits(profile.mobile.trim().to_string())));
    }
    if ctx.template.toggles.show_tax && !profile.tax_id.trim().is_empty() {
        lines.push(format!("GSTIN: {}", profile.tax_id.trim()));
    }
    if !profile.address.trim().is_empty() {
        lines.push(profile.address.trim().to_string());
    }

    Node::section(
        SectionKind::Contact,
        lines
            .into_iter()
            .map(|line| Node::Text(Text::new(line, LABEL_PT, ctx.secondary())))
            .collect(),
    )
}
