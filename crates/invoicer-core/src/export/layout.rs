//! Lays a visual tree out onto a single vector page.
//!
//! The page is as wide as the tree's viewport and at least as tall; content that does not fit
//! makes the page taller rather than breaking onto a second one. Layout works top-down in
//! points from the top-left corner and converts to PDF's bottom-left origin when the content
//! stream is written:
//! ```text
//! pdf_y = page_height - top_y
//! ```

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

use super::assets::Assets;
use super::font::{BOLD, PageFont, REGULAR};
use crate::config::Rgb;
use crate::error::{Error, Result};
use crate::render::{Align, ImageRef, Node, PT_PER_MM, Table, Text, VisualTree};

// =============================================================================
// Layout Constants
// =============================================================================

/// Page margin on every side (in millimetres).
const MARGIN_MM: f32 = 12.0;

/// Line height as a multiple of font size.
const LINE_HEIGHT_FACTOR: f32 = 1.3;

/// Baseline offset from the top of a line, as a fraction of font size.
const ASCENT_FACTOR: f32 = 0.8;

/// Padding inside table cells (in points).
const CELL_PADDING: f32 = 4.0;

/// Horizontal gap between row cells (in points).
const CELL_GAP: f32 = 8.0;

/// Watermark font size (in points).
const WATERMARK_PT: f32 = 64.0;

/// A laid-out single-page PDF
#[derive(Debug, Clone)]
pub struct VectorPage {
    pub bytes: Vec<u8>,
    pub width_pt: f32,
    pub height_pt: f32,
}

/// One primitive in top-left page coordinates
#[derive(Debug)]
enum Draw {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: Rgb,
        text: String,
    },
    Fill {
        x: f32,
        top: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    Line {
        x: f32,
        top: f32,
        width: f32,
        thickness: f32,
        color: Rgb,
    },
    Image {
        x: f32,
        top: f32,
        width: f32,
        height: f32,
        source: String,
    },
}

struct Layout<'a> {
    font: &'a PageFont,
    assets: &'a Assets,
    draws: Vec<Draw>,
}

fn aligned_x(align: Align, x: f32, width: f32, content_width: f32) -> f32 {
    match align {
        Align::Left => x,
        Align::Center => x + (width - content_width).max(0.0) / 2.0,
        Align::Right => x + (width - content_width).max(0.0),
    }
}

fn line_height(size: f32) -> f32 {
    size * LINE_HEIGHT_FACTOR
}

impl Layout<'_> {
    /// Word wrap `text` to lines no wider than `max_width`. Never returns an empty list.
    ///
    /// A word wider than `max_width` on its own is broken between characters.
    fn wrap(&self, text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            if !current.is_empty() {
                let candidate = format!("{current} {word}");
                if self.font.string_width(&candidate, size, bold) <= max_width {
                    current = candidate;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
            }

            if self.font.string_width(word, size, bold) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = self.break_word(word, size, bold, max_width);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }

    /// Split one word into pieces that each fit `max_width` (at least one char per piece)
    fn break_word(&self, word: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut piece = String::new();

        for c in word.chars() {
            piece.push(c);
            if piece.chars().count() > 1 && self.font.string_width(&piece, size, bold) > max_width
            {
                piece.pop();
                pieces.push(std::mem::replace(&mut piece, c.to_string()));
            }
        }
        if !piece.is_empty() {
            pieces.push(piece);
        }
        pieces
    }

    /// Draw wrapped lines starting at `top`; returns the y below them
    #[allow(clippy::too_many_arguments)]
    fn lines(
        &mut self,
        lines: Vec<String>,
        size: f32,
        bold: bool,
        color: Rgb,
        align: Align,
        x: f32,
        width: f32,
        top: f32,
    ) -> f32 {
        let lh = line_height(size);
        let mut y = top;
        for line in lines {
            let line_width = self.font.string_width(&line, size, bold);
            if !line.is_empty() {
                self.draws.push(Draw::Text {
                    x: aligned_x(align, x, width, line_width),
                    baseline: y + (lh - size) / 2.0 + size * ASCENT_FACTOR,
                    size,
                    bold,
                    color,
                    text: line,
                });
            }
            y += lh;
        }
        y
    }

    fn nodes(&mut self, nodes: &[Node], x: f32, width: f32, top: f32) -> Result<f32> {
        let mut y = top;
        for node in nodes {
            y = self.node(node, x, width, y)?;
        }
        Ok(y)
    }

    fn node(&mut self, node: &Node, x: f32, width: f32, top: f32) -> Result<f32> {
        match node {
            Node::Section { children, .. } => self.nodes(children, x, width, top),
            Node::Row { cells } => {
                let total: f32 = cells.iter().map(|c| c.weight).sum();
                if cells.is_empty() || total <= 0.0 {
                    return Ok(top);
                }
                #[allow(clippy::cast_precision_loss)]
                let available = (cells.len() - 1) as f32 * CELL_GAP;
                let available = (width - available).max(0.0);

                let mut cx = x;
                let mut bottom = top;
                for cell in cells {
                    let cw = available * cell.weight / total;
                    bottom = bottom.max(self.nodes(&cell.children, cx, cw, top)?);
                    cx += cw + CELL_GAP;
                }
                Ok(bottom)
            }
            Node::Text(text) => Ok(self.text(text, x, width, top)),
            Node::Image(image) => self.image(image, x, width, top),
            Node::Table(table) => Ok(self.table(table, x, width, top)),
            Node::Rule { color, thickness_pt } => {
                self.draws.push(Draw::Line {
                    x,
                    top: top + thickness_pt / 2.0,
                    width,
                    thickness: *thickness_pt,
                    color: *color,
                });
                Ok(top + thickness_pt + 2.0)
            }
            Node::Spacer { height_mm } => Ok(top + height_mm * PT_PER_MM),
        }
    }

    fn text(&mut self, text: &Text, x: f32, width: f32, top: f32) -> f32 {
        let lines = self.wrap(&text.content, text.size_pt, text.bold, width);
        self.lines(lines, text.size_pt, text.bold, text.color, text.align, x, width, top)
    }

    fn image(&mut self, image: &ImageRef, x: f32, width: f32, top: f32) -> Result<f32> {
        // Fail before drawing anything if the asset is missing
        self.assets.image(&image.source)?;

        let mut w = image.width_mm * PT_PER_MM;
        let mut h = image.height_mm * PT_PER_MM;
        if w > width && w > 0.0 {
            h *= width / w;
            w = width;
        }

        self.draws.push(Draw::Image {
            x: aligned_x(image.align, x, width, w),
            top,
            width: w,
            height: h,
            source: image.source.clone(),
        });
        Ok(top + h + 2.0)
    }

    fn table(&mut self, table: &Table, x: f32, width: f32, top: f32) -> f32 {
        let total: f32 = table.columns.iter().map(|c| c.weight).sum();
        if table.columns.is_empty() || total <= 0.0 {
            return top;
        }
        let widths: Vec<f32> = table
            .columns
            .iter()
            .map(|c| width * c.weight / total)
            .collect();

        let size = table.font_size_pt;
        let small = size - 1.0;

        // Header band
        let header_height = line_height(size) + 2.0 * CELL_PADDING;
        self.draws.push(Draw::Fill {
            x,
            top,
            width,
            height: header_height,
            color: table.header_background,
        });
        let mut cx = x;
        for (column, &cw) in table.columns.iter().zip(&widths) {
            let inner = (cw - 2.0 * CELL_PADDING).max(0.0);
            let lines = vec![column.title.clone()];
            self.lines(
                lines,
                size,
                true,
                table.header_color,
                column.align,
                cx + CELL_PADDING,
                inner,
                top + CELL_PADDING,
            );
            cx += cw;
        }

        let mut y = top + header_height;
        for (index, row) in table.rows.iter().enumerate() {
            // Measure first so the zebra band sits under the text
            let wrapped: Vec<(Vec<String>, Vec<String>)> = row
                .iter()
                .zip(&widths)
                .map(|(cell, &cw)| {
                    let inner = (cw - 2.0 * CELL_PADDING).max(0.0);
                    let primary = self.wrap(&cell.primary, size, false, inner);
                    let secondary = cell
                        .secondary
                        .as_deref()
                        .map(|s| self.wrap(s, small, false, inner))
                        .unwrap_or_default();
                    (primary, secondary)
                })
                .collect();

            #[allow(clippy::cast_precision_loss)]
            let row_height = wrapped
                .iter()
                .map(|(p, s)| {
                    p.len() as f32 * line_height(size) + s.len() as f32 * line_height(small)
                })
                .fold(line_height(size), f32::max)
                + 2.0 * CELL_PADDING;

            if index % 2 == 1 {
                self.draws.push(Draw::Fill {
                    x,
                    top: y,
                    width,
                    height: row_height,
                    color: table.body_background,
                });
            }

            let mut cx = x;
            for ((primary, secondary), (column, &cw)) in
                wrapped.into_iter().zip(table.columns.iter().zip(&widths))
            {
                let inner = (cw - 2.0 * CELL_PADDING).max(0.0);
                let below = self.lines(
                    primary,
                    size,
                    false,
                    table.text_color,
                    column.align,
                    cx + CELL_PADDING,
                    inner,
                    y + CELL_PADDING,
                );
                self.lines(
                    secondary,
                    small,
                    false,
                    Rgb::slate(),
                    column.align,
                    cx + CELL_PADDING,
                    inner,
                    below,
                );
                cx += cw;
            }

            y += row_height;
        }

        self.draws.push(Draw::Line {
            x,
            top: y,
            width,
            thickness: 0.75,
            color: table.header_background,
        });
        y + 1.0
    }
}

fn fill_color(color: Rgb) -> Operation {
    let (r, g, b) = color.to_unit();
    Operation::new("rg", vec![r.into(), g.into(), b.into()])
}

fn stroke_color(color: Rgb) -> Operation {
    let (r, g, b) = color.to_unit();
    Operation::new("RG", vec![r.into(), g.into(), b.into()])
}

/// Lay out `tree` at its viewport width and write it as a one-page PDF.
pub fn layout_page(tree: &VisualTree, assets: &Assets) -> Result<VectorPage> {
    let margin = MARGIN_MM * PT_PER_MM;
    let width_pt = tree.viewport.width_mm * PT_PER_MM;
    let min_height_pt = tree.viewport.height_mm * PT_PER_MM;
    let content_width = width_pt - 2.0 * margin;
    if content_width <= 0.0 {
        return Err(Error::ExportFailure(format!(
            "viewport {}mm is narrower than the margins",
            tree.viewport.width_mm
        )));
    }

    let mut layout = Layout {
        font: &assets.font,
        assets,
        draws: Vec::new(),
    };
    let bottom = layout.nodes(&tree.nodes, margin, content_width, margin)?;
    let height_pt = min_height_pt.max(bottom + margin);

    let mut doc = Document::with_version("1.5");
    let mut ops = vec![
        fill_color(tree.background),
        Operation::new("re", vec![0.0f32.into(), 0.0f32.into(), width_pt.into(), height_pt.into()]),
        Operation::new("f", vec![]),
    ];

    let mut chars: BTreeSet<char> = BTreeSet::new();
    let font = &assets.font;

    if let Some(ref mark) = tree.watermark {
        font.ensure_drawable(&mark.text)?;
        chars.extend(mark.text.chars());
        let text_width = font.string_width(&mark.text, WATERMARK_PT, true);
        let (cos, sin) = (std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2);
        ops.extend([
            Operation::new("BT", vec![]),
            fill_color(mark.color),
            Operation::new("Tf", vec![BOLD.into(), WATERMARK_PT.into()]),
            Operation::new(
                "Tm",
                vec![
                    cos.into(),
                    sin.into(),
                    (-sin).into(),
                    cos.into(),
                    (width_pt / 2.0).into(),
                    (height_pt / 2.0).into(),
                ],
            ),
            Operation::new("Td", vec![(-text_width / 2.0).into(), (-WATERMARK_PT / 3.0).into()]),
            Operation::new("Tj", vec![font.encode(&mark.text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    let mut images: BTreeMap<String, String> = BTreeMap::new();
    let mut xobjects = Dictionary::new();

    for draw in layout.draws {
        match draw {
            Draw::Text {
                x,
                baseline,
                size,
                bold,
                color,
                text,
            } => {
                font.ensure_drawable(&text)?;
                chars.extend(text.chars());
                let face = if bold { BOLD } else { REGULAR };
                ops.push(Operation::new("BT", vec![]));
                ops.push(fill_color(color));
                if bold && font.synthetic_bold() {
                    ops.push(stroke_color(color));
                    ops.push(Operation::new("w", vec![(size * 0.03).into()]));
                    ops.push(Operation::new("Tr", vec![2.into()]));
                } else {
                    ops.push(Operation::new("Tr", vec![0.into()]));
                }
                ops.push(Operation::new("Tf", vec![face.into(), size.into()]));
                ops.push(Operation::new("Td", vec![x.into(), (height_pt - baseline).into()]));
                ops.push(Operation::new("Tj", vec![font.encode(&text)]));
                ops.push(Operation::new("ET", vec![]));
            }
            Draw::Fill {
                x,
                top,
                width,
                height,
                color,
            } => {
                ops.push(fill_color(color));
                ops.push(Operation::new(
                    "re",
                    vec![x.into(), (height_pt - top - height).into(), width.into(), height.into()],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            Draw::Line {
                x,
                top,
                width,
                thickness,
                color,
            } => {
                let y = height_pt - top;
                ops.push(stroke_color(color));
                ops.push(Operation::new("w", vec![thickness.into()]));
                ops.push(Operation::new("m", vec![x.into(), y.into()]));
                ops.push(Operation::new("l", vec![(x + width).into(), y.into()]));
                ops.push(Operation::new("S", vec![]));
            }
            Draw::Image {
                x,
                top,
                width,
                height,
                source,
            } => {
                let name = match images.get(&source) {
                    Some(name) => name.clone(),
                    None => {
                        let image = assets.image(&source)?;
                        let name = format!("Im{}", images.len());
                        let dict = Dictionary::from_iter([
                            ("Type", Object::Name(b"XObject".to_vec())),
                            ("Subtype", Object::Name(b"Image".to_vec())),
                            ("Width", Object::Integer(i64::from(image.width()))),
                            ("Height", Object::Integer(i64::from(image.height()))),
                            ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                            ("BitsPerComponent", Object::Integer(8)),
                        ]);
                        let id = doc.add_object(Stream::new(dict, image.as_raw().clone()));
                        xobjects.set(name.as_str(), Object::Reference(id));
                        images.insert(source, name.clone());
                        name
                    }
                };
                ops.extend([
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            width.into(),
                            0.0f32.into(),
                            0.0f32.into(),
                            height.into(),
                            x.into(),
                            (height_pt - top - height).into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                    Operation::new("Q", vec![]),
                ]);
            }
        }
    }

    let content = Content { operations: ops }
        .encode()
        .map_err(|e| Error::ExportFailure(format!("Failed to encode page content: {e}")))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let fonts = font.resources(&mut doc, &chars)?;
    let resources = Dictionary::from_iter([
        ("Font", Object::Dictionary(fonts)),
        ("XObject", Object::Dictionary(xobjects)),
    ]);

    let bytes = write_single_page(doc, width_pt, height_pt, content_id, resources)?;
    Ok(VectorPage {
        bytes,
        width_pt,
        height_pt,
    })
}

/// Attach one page with the given content and resources, and serialize the document
pub(super) fn write_single_page(
    mut doc: Document,
    width_pt: f32,
    height_pt: f32,
    content_id: lopdf::ObjectId,
    resources: Dictionary,
) -> Result<Vec<u8>> {
    let pages_id = doc.new_object_id();

    let page_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        ("Contents", Object::Reference(content_id)),
        ("Resources", Object::Dictionary(resources)),
        (
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), width_pt.into(), height_pt.into()]),
        ),
    ]));

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::ExportFailure(format!("Failed to save PDF: {e}")))?;
    Ok(output)
}
