//! Fonts for the intermediate vector page.
//!
//! Without a configured font the page uses the standard Helvetica pair, which only covers
//! Latin text. A TrueType font with target-script coverage can be supplied at runtime; it is
//! embedded as a CIDFont with Identity-H encoding so any glyph it contains can be drawn.
//!
//! # PDF Font Structure
//!
//! - **Type0 font**: top-level dictionary referencing
//!   - **CIDFontType2**: glyph widths, referencing
//!     - **FontDescriptor** with the **FontFile2** program
//!   - **ToUnicode CMap**

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, Stream};
use ttf_parser::{Face, GlyphId};

use crate::error::{Error, Result};

/// Resource name of the regular face
pub const REGULAR: &str = "F1";
/// Resource name of the bold face
pub const BOLD: &str = "F2";

/// A TrueType font loaded at runtime.
pub struct EmbeddedFont {
    data: Arc<[u8]>,
    units_per_em: u16,
}

impl EmbeddedFont {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let face = Face::parse(&data, 0)
            .map_err(|e| Error::ExportFailure(format!("Failed to parse font: {e}")))?;
        let units_per_em = face.units_per_em();
        Ok(Self {
            data: data.into(),
            units_per_em,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            Error::ExportFailure(format!("Failed to read font {}: {e}", path.display()))
        })?;
        Self::from_bytes(data)
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    /// Glyph ID for a character, falling back to .notdef (0).
    fn glyph_id(face: &Face<'_>, c: char) -> u16 {
        face.glyph_index(c).map_or(0, |g| g.0)
    }

    /// Width of a string in points at `font_size`.
    #[allow(clippy::cast_precision_loss)]
    pub fn string_width(&self, text: &str, font_size: f32) -> f32 {
        let Some(face) = self.face() else {
            return 0.0;
        };
        let total_units: u32 = text
            .chars()
            .map(|c| {
                u32::from(
                    face.glyph_hor_advance(GlyphId(Self::glyph_id(&face, c)))
                        .unwrap_or(0),
                )
            })
            .sum();
        total_units as f32 * font_size / f32::from(self.units_per_em)
    }

    /// Big-endian glyph IDs, as an Identity-H string operand expects.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let Some(face) = self.face() else {
            return Vec::new();
        };
        text.chars()
            .flat_map(|c| Self::glyph_id(&face, c).to_be_bytes())
            .collect()
    }

    fn scale_width(&self, width: u16) -> i64 {
        (i64::from(width) * 1000) / i64::from(self.units_per_em)
    }

    /// W array for the glyphs of `chars`: `[gid [w1 w2 ...]]` per consecutive run.
    fn widths_array(&self, face: &Face<'_>, chars: &BTreeSet<char>) -> Vec<Object> {
        let gid_widths: BTreeMap<u16, i64> = chars
            .iter()
            .map(|&c| Self::glyph_id(face, c))
            .filter(|&gid| gid != 0)
            .map(|gid| {
                let width = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
                (gid, self.scale_width(width))
            })
            .collect();

        let mut result = Vec::new();
        let mut iter = gid_widths.iter().peekable();

        while let Some((&first_gid, &first_width)) = iter.next() {
            let mut widths = vec![Object::Integer(first_width)];
            let mut expected_next = first_gid + 1;

            while let Some(&(&gid, &width)) = iter.peek() {
                if gid != expected_next {
                    break;
                }
                widths.push(Object::Integer(width));
                expected_next += 1;
                iter.next();
            }

            result.push(Object::Integer(i64::from(first_gid)));
            result.push(Object::Array(widths));
        }

        result
    }

    /// Add the font objects to `doc`, covering the glyphs of `chars`. Returns the Type0 font.
    #[allow(clippy::cast_possible_wrap)]
    pub fn embed(&self, doc: &mut Document, chars: &BTreeSet<char>) -> Result<ObjectId> {
        let face = self
            .face()
            .ok_or_else(|| Error::ExportFailure("Font data became unreadable".to_string()))?;

        let mut file_dict = Dictionary::new();
        file_dict.set("Length1", Object::Integer(self.data.len() as i64));
        let font_file_id = doc.add_object(Stream::new(file_dict, self.data.to_vec()).with_compression(true));

        let bbox = face.global_bounding_box();
        let descriptor_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(b"InvoiceFont".to_vec())),
            ("Flags", Object::Integer(32)),
            (
                "FontBBox",
                Object::Array(vec![
                    Object::Integer(i64::from(bbox.x_min)),
                    Object::Integer(i64::from(bbox.y_min)),
                    Object::Integer(i64::from(bbox.x_max)),
                    Object::Integer(i64::from(bbox.y_max)),
                ]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(i64::from(face.ascender()))),
            ("Descent", Object::Integer(i64::from(face.descender()))),
            (
                "CapHeight",
                Object::Integer(i64::from(face.capital_height().unwrap_or_else(|| face.ascender()))),
            ),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]));

        let default_width = self.scale_width(
            face.glyph_hor_advance(GlyphId(Self::glyph_id(&face, ' ')))
                .unwrap_or(0),
        );

        let cid_font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(b"InvoiceFont".to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter([
                    ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
                    ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(default_width)),
            ("W", Object::Array(self.widths_array(&face, chars))),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]));

        Ok(doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(b"InvoiceFont".to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
        ])))
    }
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Bold text is drawn slightly wider than regular
const BOLD_WIDTH_FACTOR: f32 = 1.06;

/// The fonts a vector page is drawn with
#[derive(Clone, Default)]
pub enum PageFont {
    /// Standard Helvetica / Helvetica-Bold (Latin only)
    #[default]
    Builtin,
    Embedded(Arc<EmbeddedFont>),
}

impl PageFont {
    /// Characters the builtin font can draw: printable ASCII, plus `₹` written as `Rs.`
    fn builtin_covers(c: char) -> bool {
        c == '₹' || (' '..='~').contains(&c)
    }

    /// Replace text the builtin font cannot draw
    fn latin_fallback(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '₹' => "Rs.".to_string(),
                c if Self::builtin_covers(c) => c.to_string(),
                _ => "?".to_string(),
            })
            .collect()
    }

    /// Fail when `text` has characters this font would draw as placeholders.
    ///
    /// Only the builtin font is checked; an embedded font is trusted to cover what it was
    /// configured for.
    pub fn ensure_drawable(&self, text: &str) -> Result<()> {
        match self {
            Self::Builtin => match text
                .chars()
                .find(|c| !c.is_ascii_whitespace() && !Self::builtin_covers(*c))
            {
                Some(c) => Err(Error::ExportFailure(format!(
                    "{c:?} (U+{:04X}) in {text:?} needs a font with target-script glyphs; \
                     set export.font_path",
                    u32::from(c)
                ))),
                None => Ok(()),
            },
            Self::Embedded(_) => Ok(()),
        }
    }

    /// Width of `text` in points
    pub fn string_width(&self, text: &str, size_pt: f32, bold: bool) -> f32 {
        let width = match self {
            Self::Builtin => {
                let units: u32 = Self::latin_fallback(text)
                    .bytes()
                    .map(|b| u32::from(HELVETICA_WIDTHS[usize::from(b - b' ')]))
                    .sum();
                #[allow(clippy::cast_precision_loss)]
                let units = units as f32;
                units * size_pt / 1000.0
            }
            Self::Embedded(font) => font.string_width(text, size_pt),
        };
        if bold { width * BOLD_WIDTH_FACTOR } else { width }
    }

    /// String operand for `Tj`
    pub fn encode(&self, text: &str) -> Object {
        match self {
            Self::Builtin => Object::string_literal(Self::latin_fallback(text)),
            Self::Embedded(font) => Object::String(font.encode(text), StringFormat::Hexadecimal),
        }
    }

    /// Embedded fonts have no bold face; bold is simulated by stroking the outline
    pub const fn synthetic_bold(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }

    /// Font resource dictionary (`F1` regular, `F2` bold)
    pub fn resources(&self, doc: &mut Document, chars: &BTreeSet<char>) -> Result<Dictionary> {
        match self {
            Self::Builtin => {
                let face = |name: &[u8]| {
                    Object::Dictionary(Dictionary::from_iter([
                        ("Type", Object::Name(b"Font".to_vec())),
                        ("Subtype", Object::Name(b"Type1".to_vec())),
                        ("BaseFont", Object::Name(name.to_vec())),
                        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
                    ]))
                };
                let regular = doc.add_object(face(b"Helvetica"));
                let bold = doc.add_object(face(b"Helvetica-Bold"));
                Ok(Dictionary::from_iter([
                    (REGULAR, Object::Reference(regular)),
                    (BOLD, Object::Reference(bold)),
                ]))
            }
            Self::Embedded(font) => {
                let id = font.embed(doc, chars)?;
                Ok(Dictionary::from_iter([
                    (REGULAR, Object::Reference(id)),
                    (BOLD, Object::Reference(id)),
                ]))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_widths() {
        let font = PageFont::Builtin;
        // "0" is 556/1000 em
        assert!((font.string_width("0", 10.0, false) - 5.56).abs() < 1e-4);
        assert!(font.string_width("WWW", 10.0, true) > font.string_width("WWW", 10.0, false));
    }

    #[test]
    fn test_builtin_replaces_unsupported_glyphs() {
        assert_eq!(PageFont::latin_fallback("₹1,000"), "Rs.1,000");
        assert_eq!(PageFont::latin_fallback("ટા"), "??");
        // Non-Latin text still has a measurable width
        assert!(PageFont::Builtin.string_width("ટાઇલ્સ", 10.0, false) > 0.0);
    }

    #[test]
    fn test_builtin_rejects_target_script() {
        let font = PageFont::Builtin;
        assert!(font.ensure_drawable("Tiles fitting ₹1,64,983.50").is_ok());

        let err = font.ensure_drawable("ટાઇલ્સ ફિટિંગ").unwrap_err();
        assert!(matches!(err, Error::ExportFailure(ref m) if m.contains("font_path")));
        // Gujarati digits are just as undrawable
        assert!(font.ensure_drawable("૧૨૩").is_err());
    }

    #[test]
    fn test_invalid_font_rejected() {
        assert!(EmbeddedFont::from_bytes(b"not a font".to_vec()).is_err());
    }
}
