//! Word-compatible markup export.
//!
//! Word opens HTML served as `application/msword` with a `.doc` name, so the simple document is
//! the visual tree flattened into styled HTML. Unlike the PDF export, its text stays editable.

use askama::Template;

use crate::error::{Error, Result};
use crate::render::{Align, Node, Table, Text, VisualTree};

pub const DOC_CONTENT_TYPE: &str = "application/msword";
pub const DOC_EXTENSION: &str = "doc";

/// A rendered markup document
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    pub html: String,
}

impl MarkupDocument {
    pub const fn content_type(&self) -> &'static str {
        DOC_CONTENT_TYPE
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.html.into_bytes()
    }
}

// =============================================================================
// Template view types
// =============================================================================

struct Paragraph {
    text: String,
    style: String,
}

struct ImageView {
    src: String,
    width_mm: f32,
    height_mm: f32,
    align: &'static str,
}

struct CellView {
    width_pct: u32,
    paragraphs: Vec<Paragraph>,
    images: Vec<ImageView>,
}

struct ColumnView {
    title: String,
    align: &'static str,
}

struct TableCellView {
    primary: String,
    secondary: Option<String>,
    align: &'static str,
}

struct TableView {
    header_style: String,
    columns: Vec<ColumnView>,
    rows: Vec<Vec<TableCellView>>,
    stripe: String,
}

#[derive(Default)]
struct Block {
    paragraph: Option<Paragraph>,
    row: Option<Vec<CellView>>,
    table: Option<TableView>,
    image: Option<ImageView>,
    rule: Option<String>,
    spacer_mm: Option<f32>,
}

#[derive(Template)]
#[template(path = "invoice_doc.html")]
struct DocTemplate<'a> {
    title: &'a str,
    background: String,
    watermark: Option<&'a str>,
    blocks: Vec<Block>,
}

const fn align_css(align: Align) -> &'static str {
    match align {
        Align::Left => "left",
        Align::Center => "center",
        Align::Right => "right",
    }
}

fn paragraph(text: &Text) -> Paragraph {
    Paragraph {
        text: text.content.clone(),
        style: format!(
            "text-align:{};font-size:{}pt;color:{};font-weight:{}",
            align_css(text.align),
            text.size_pt,
            text.color.to_hex(),
            if text.bold { "bold" } else { "normal" }
        ),
    }
}

fn image_view(image: &crate::render::ImageRef) -> ImageView {
    ImageView {
        src: image.source.clone(),
        width_mm: image.width_mm,
        height_mm: image.height_mm,
        align: align_css(image.align),
    }
}

fn table_view(table: &Table) -> TableView {
    TableView {
        header_style: format!(
            "background:{};color:{}",
            table.header_background.to_hex(),
            table.header_color.to_hex()
        ),
        columns: table
            .columns
            .iter()
            .map(|c| ColumnView {
                title: c.title.clone(),
                align: align_css(c.align),
            })
            .collect(),
        rows: table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&table.columns)
                    .map(|(cell, column)| TableCellView {
                        primary: cell.primary.clone(),
                        secondary: cell.secondary.clone(),
                        align: align_css(column.align),
                    })
                    .collect()
            })
            .collect(),
        stripe: table.body_background.to_hex(),
    }
}

/// Collect the text and images of nested nodes into one cell
fn fill_cell(nodes: &[Node], cell: &mut CellView) {
    for node in nodes {
        match node {
            Node::Text(text) => cell.paragraphs.push(paragraph(text)),
            Node::Image(image) => cell.images.push(image_view(image)),
            Node::Section { children, .. } => fill_cell(children, cell),
            Node::Row { cells } => {
                for inner in cells {
                    fill_cell(&inner.children, cell);
                }
            }
            Node::Table(_) | Node::Rule { .. } | Node::Spacer { .. } => {}
        }
    }
}

fn flatten(nodes: &[Node], blocks: &mut Vec<Block>) {
    for node in nodes {
        match node {
            Node::Section { children, .. } => flatten(children, blocks),
            Node::Text(text) => blocks.push(Block {
                paragraph: Some(paragraph(text)),
                ..Block::default()
            }),
            Node::Image(image) => blocks.push(Block {
                image: Some(image_view(image)),
                ..Block::default()
            }),
            Node::Table(table) => blocks.push(Block {
                table: Some(table_view(table)),
                ..Block::default()
            }),
            Node::Rule { color, thickness_pt } => blocks.push(Block {
                rule: Some(format!("border-top:{}pt solid {}", thickness_pt, color.to_hex())),
                ..Block::default()
            }),
            Node::Spacer { height_mm } => blocks.push(Block {
                spacer_mm: Some(*height_mm),
                ..Block::default()
            }),
            Node::Row { cells } => {
                let total: f32 = cells.iter().map(|c| c.weight).sum();
                let views = cells
                    .iter()
                    .map(|c| {
                        let mut view = CellView {
                            width_pct: percent(c.weight, total),
                            paragraphs: Vec::new(),
                            images: Vec::new(),
                        };
                        fill_cell(&c.children, &mut view);
                        view
                    })
                    .collect();
                blocks.push(Block {
                    row: Some(views),
                    ..Block::default()
                });
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(weight: f32, total: f32) -> u32 {
    if total <= 0.0 {
        return 0;
    }
    (weight / total * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Flatten `tree` into a Word-compatible HTML document
pub fn to_simple_document(tree: &VisualTree) -> Result<MarkupDocument> {
    let mut blocks = Vec::new();
    flatten(&tree.nodes, &mut blocks);

    let template = DocTemplate {
        title: &tree.title,
        background: tree.background.to_hex(),
        watermark: tree.watermark.as_ref().map(|w| w.text.as_str()),
        blocks,
    };

    let html = template
        .render()
        .map_err(|e| Error::ExportFailure(format!("Failed to render document: {e}")))?;
    Ok(MarkupDocument { html })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Rgb;
    use crate::render::{Column, PageSize, SectionKind, TableCell, Viewport, WatermarkMark};

    fn tree() -> VisualTree {
        VisualTree {
            viewport: Viewport::for_page(PageSize::A4),
            title: "TAX INVOICE".to_string(),
            background: Rgb::white(),
            watermark: Some(WatermarkMark {
                text: "PAID".to_string(),
                color: Rgb::light_gray(),
            }),
            nodes: vec![
                Node::section(
                    SectionKind::Header,
                    vec![Node::row([
                        (2.0, vec![Node::Text(Text::new("Shree <Tiles> & Co", 16.0, Rgb::navy()).bold())]),
                        (1.0, vec![Node::Text(Text::new("TAX INVOICE", 18.0, Rgb::navy()))]),
                    ])],
                ),
                Node::Table(Table {
                    columns: vec![Column {
                        title: "Description".into(),
                        weight: 1.0,
                        align: Align::Left,
                    }],
                    rows: vec![vec![TableCell {
                        primary: "Tiles fitting".into(),
                        secondary: Some("ટાઇલ્સ ફિટિંગ".into()),
                    }]],
                    header_background: Rgb::navy(),
                    header_color: Rgb::white(),
                    body_background: Rgb::light_gray(),
                    text_color: Rgb::black(),
                    font_size_pt: 9.5,
                }),
            ],
        }
    }

    #[test]
    fn test_document_contains_content_and_escapes() {
        let doc = to_simple_document(&tree()).unwrap();
        assert!(doc.html.contains("urn:schemas-microsoft-com:office:word"));
        assert!(doc.html.contains("Tiles fitting"));
        assert!(doc.html.contains("ટાઇલ્સ ફિટિંગ"));
        assert!(doc.html.contains("PAID"));
        assert!(doc.html.contains("Shree &#60;Tiles&#62; &#38; Co") || doc.html.contains("Shree &lt;Tiles&gt; &amp; Co"));
        assert!(!doc.html.contains("<Tiles>"));
        assert_eq!(doc.content_type(), "application/msword");
    }

    #[test]
    fn test_row_widths() {
        assert_eq!(percent(2.0, 3.0), 67);
        assert_eq!(percent(1.0, 0.0), 0);
    }
}
