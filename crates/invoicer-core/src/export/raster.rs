//! Rasterization of a visual tree into a fixed-width bitmap.

use std::ops::{Deref, DerefMut};

use image::RgbImage;
use mupdf::{Colorspace, Document as MuDocument, Matrix};
use tracing::debug;

use super::assets::Assets;
use super::layout::layout_page;
use crate::error::{Error, Result};
use crate::render::{PageSize, Viewport, VisualTree};

/// Default scale factor for rendering (2.0 for high DPI)
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Forces a tree's viewport for the duration of a capture and restores it on drop,
/// whichever way the capture exits.
pub struct ViewportGuard<'a> {
    tree: &'a mut VisualTree,
    saved: Viewport,
}

impl<'a> ViewportGuard<'a> {
    pub fn force(tree: &'a mut VisualTree, viewport: Viewport) -> Self {
        let saved = tree.viewport;
        tree.viewport = viewport;
        Self { tree, saved }
    }
}

impl Deref for ViewportGuard<'_> {
    type Target = VisualTree;

    fn deref(&self) -> &VisualTree {
        self.tree
    }
}

impl DerefMut for ViewportGuard<'_> {
    fn deref_mut(&mut self) -> &mut VisualTree {
        self.tree
    }
}

impl Drop for ViewportGuard<'_> {
    fn drop(&mut self) {
        self.tree.viewport = self.saved;
    }
}

/// A rendered page bitmap
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub image: RgbImage,
    pub scale: f32,
}

impl RasterImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Pixel width of `page` at `scale`
pub fn page_width_px(page: PageSize, scale: f32) -> u32 {
    f32_to_u32((page.width_pt * scale).round())
}

/// Render `tree` at the physical width of `page`.
///
/// The output is always `page_width_px(page, scale)` wide; its height follows the content
/// (at least one page tall). The tree's viewport is unchanged afterwards.
pub fn rasterize(
    tree: &mut VisualTree,
    page: PageSize,
    scale: f32,
    assets: &Assets,
) -> Result<RasterImage> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Error::ExportFailure(format!("invalid render scale {scale}")));
    }

    let guard = ViewportGuard::force(tree, Viewport::for_page(page));
    let vector = layout_page(&guard, assets)?;
    debug!(
        "Laid out page {:.1}x{:.1}pt ({} bytes)",
        vector.width_pt,
        vector.height_pt,
        vector.bytes.len()
    );

    let image = render_pdf_page(&vector.bytes, scale)?;

    let expected = page_width_px(page, scale);
    let image = if image.width() == expected {
        image
    } else {
        // MuPDF rounds page bounds; snap to the exact physical width
        let height = scaled_height(image.height(), image.width(), expected);
        image::imageops::resize(&image, expected, height, image::imageops::FilterType::Triangle)
    };

    Ok(RasterImage { image, scale })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_height(height: u32, width: u32, target_width: u32) -> u32 {
    let h = u64::from(height) * u64::from(target_width) / u64::from(width.max(1));
    u32::try_from(h).unwrap_or(u32::MAX).max(1)
}

/// Render page 0 of a PDF to RGB pixels
fn render_pdf_page(pdf_bytes: &[u8], scale: f32) -> Result<RgbImage> {
    let render_err = |reason: String| Error::ExportFailure(format!("rasterization failed: {reason}"));

    let doc = MuDocument::from_bytes(pdf_bytes, "")
        .map_err(|e| render_err(format!("Failed to parse page: {e}")))?;
    let page = doc
        .load_page(0)
        .map_err(|e| render_err(format!("Failed to load page: {e}")))?;

    let matrix = Matrix::new_scale(scale, scale);
    let pixmap = page
        .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
        .map_err(|e| render_err(format!("Failed to render: {e}")))?;

    let pixels = pixmap.samples();
    let img_width = pixmap.width();
    let img_height = pixmap.height();

    let n = pixmap.n() as usize;
    let mut rgb_pixels = Vec::with_capacity((img_width * img_height * 3) as usize);

    for chunk in pixels.chunks(n) {
        match n {
            // Alpha is dropped: the page background is opaque
            3 | 4 => rgb_pixels.extend_from_slice(&chunk[..3]),
            1 | 2 => rgb_pixels.extend_from_slice(&[chunk[0], chunk[0], chunk[0]]),
            _ => {
                return Err(render_err(format!(
                    "Unexpected pixel format with {n} components"
                )));
            }
        }
    }

    RgbImage::from_raw(img_width, img_height, rgb_pixels)
        .ok_or_else(|| render_err("Failed to create image buffer".to_string()))
}

/// Convert f32 dimension to u32, clamping to valid range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
const fn f32_to_u32(value: f32) -> u32 {
    const MAX: f32 = u32::MAX as f32;
    let clamped = if value < 0.0 {
        0.0
    } else if value > MAX {
        MAX
    } else {
        value
    };
    clamped as u32
}
