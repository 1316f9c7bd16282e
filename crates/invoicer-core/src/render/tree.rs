//! The printable visual tree produced by projection and consumed by export.

use serde::Serialize;

use crate::config::Rgb;
use crate::document::Position;

/// Points per millimetre
pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// Physical page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const A4: Self = Self {
        width_pt: 595.28,
        height_pt: 841.89,
    };

    pub fn width_mm(self) -> f32 {
        self.width_pt / PT_PER_MM
    }

    pub fn height_mm(self) -> f32 {
        self.height_pt / PT_PER_MM
    }
}

/// The container the tree is laid out in, in millimetres.
///
/// Editing surfaces use whatever width they have; export forces the page size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Viewport {
    pub fn for_page(page: PageSize) -> Self {
        Self {
            width_mm: page.width_mm(),
            height_mm: page.height_mm(),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::for_page(PageSize::A4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl From<Position> for Align {
    fn from(position: Position) -> Self {
        match position {
            Position::Left => Self::Left,
            Position::Center => Self::Center,
            Position::Right => Self::Right,
        }
    }
}

/// Identifies which part of the document a section renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Header,
    Logo,
    Party,
    Items,
    Totals,
    Contact,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub content: String,
    pub size_pt: f32,
    pub bold: bool,
    pub color: Rgb,
    pub align: Align,
}

impl Text {
    pub fn new(content: impl Into<String>, size_pt: f32, color: Rgb) -> Self {
        Self {
            content: content.into(),
            size_pt,
            bold: false,
            color,
            align: Align::Left,
        }
    }

    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub const fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }
}

/// An external image (the company logo)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRef {
    pub source: String,
    pub width_mm: f32,
    pub height_mm: f32,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub weight: f32,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub title: String,
    pub weight: f32,
    pub align: Align,
}

/// Table cell with an optional second line (the translated description)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCell {
    pub primary: String,
    pub secondary: Option<String>,
}

impl TableCell {
    pub fn text(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<TableCell>>,
    pub header_background: Rgb,
    pub header_color: Rgb,
    pub body_background: Rgb,
    pub text_color: Rgb,
    pub font_size_pt: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Section { kind: SectionKind, children: Vec<Node> },
    /// Horizontal arrangement; cells share the width by weight
    Row { cells: Vec<Cell> },
    Text(Text),
    Image(ImageRef),
    Table(Table),
    Rule { color: Rgb, thickness_pt: f32 },
    Spacer { height_mm: f32 },
}

impl Node {
    pub const fn section(kind: SectionKind, children: Vec<Node>) -> Self {
        Self::Section { kind, children }
    }

    pub fn row(cells: impl IntoIterator<Item = (f32, Vec<Node>)>) -> Self {
        Self::Row {
            cells: cells
                .into_iter()
                .map(|(weight, children)| Cell { weight, children })
                .collect(),
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        match self {
            Self::Section { children, .. } => {
                for child in children {
                    child.visit(f);
                }
            }
            Self::Row { cells } => {
                for child in cells.iter().flat_map(|cell| &cell.children) {
                    child.visit(f);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkMark {
    pub text: String,
    pub color: Rgb,
}

/// A fully resolved, printable document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualTree {
    pub viewport: Viewport,
    pub title: String,
    pub background: Rgb,
    pub watermark: Option<WatermarkMark>,
    pub nodes: Vec<Node>,
}

impl VisualTree {
    /// Depth-first walk over every node
    pub fn walk<'a>(&'a self, mut f: impl FnMut(&'a Node)) {
        for node in &self.nodes {
            node.visit(&mut f);
        }
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        let mut found = false;
        self.walk(|node| {
            if matches!(node, Node::Section { kind: k, .. } if *k == kind) {
                found = true;
            }
        });
        found
    }

    /// Every piece of text in document order, table cells included
    pub fn texts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(|node| match node {
            Node::Text(text) => out.push(text.content.as_str()),
            Node::Table(table) => {
                out.extend(table.columns.iter().map(|c| c.title.as_str()));
                for cell in table.rows.iter().flatten() {
                    out.push(cell.primary.as_str());
                    if let Some(ref secondary) = cell.secondary {
                        out.push(secondary.as_str());
                    }
                }
            }
            _ => {}
        });
        out
    }

    /// External images the tree refers to
    pub fn image_sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(|node| {
            if let Node::Image(image) = node {
                out.push(image.source.as_str());
            }
        });
        out
    }
}
