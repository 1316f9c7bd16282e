//! Embedding a raster capture into a single-page PDF.
//!
//! The result is an image inside a page, not a text document: nothing in it is selectable or
//! searchable. Content taller than one page is scaled down onto that page rather than split
//! across several (there is no pagination).

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use serde::Serialize;

use super::layout::write_single_page;
use super::raster::RasterImage;
use crate::error::{Error, Result};
use crate::render::PageSize;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Default JPEG quality for the embedded capture
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Where the image sits on the page, in points from the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit an image of `width_px × height_px` inside `page`, preserving aspect ratio, centred on
/// the axis that has slack.
#[allow(clippy::cast_precision_loss)]
pub fn fit_to_page(width_px: u32, height_px: u32, page: PageSize) -> Placement {
    let (w, h) = (width_px.max(1) as f32, height_px.max(1) as f32);
    let scale = (page.width_pt / w).min(page.height_pt / h);
    let width = w * scale;
    let height = h * scale;

    Placement {
        x: (page.width_pt - width) / 2.0,
        y: (page.height_pt - height) / 2.0,
        width,
        height,
    }
}

/// An exported PDF
#[derive(Debug, Clone)]
pub struct ExportedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub placement: Placement,
}

/// Embed `raster` as a JPEG on one `page`-sized page
pub fn to_pdf(raster: &RasterImage, page: PageSize, jpeg_quality: u8) -> Result<ExportedPdf> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality.clamp(1, 100))
        .encode(
            raster.image.as_raw(),
            raster.width(),
            raster.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::ExportFailure(format!("Failed to encode JPEG: {e}")))?;

    let placement = fit_to_page(raster.width(), raster.height(), page);

    let mut doc = Document::with_version("1.5");
    let image_id = doc.add_object(Stream::new(
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(raster.width()))),
            ("Height", Object::Integer(i64::from(raster.height()))),
            ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"DCTDecode".to_vec())),
        ]),
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    placement.width.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    placement.height.into(),
                    placement.x.into(),
                    placement.y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Capture".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    }
    .encode()
    .map_err(|e| Error::ExportFailure(format!("Failed to encode PDF content: {e}")))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let resources = Dictionary::from_iter([(
        "XObject",
        Object::Dictionary(Dictionary::from_iter([("Capture", Object::Reference(image_id))])),
    )]);

    let bytes = write_single_page(doc, page.width_pt, page.height_pt, content_id, resources)?;

    Ok(ExportedPdf {
        bytes,
        page_count: 1,
        placement,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn raster(width: u32, height: u32) -> RasterImage {
        RasterImage {
            image: RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])),
            scale: 1.0,
        }
    }

    #[test]
    fn test_page_shaped_capture_fills_page() {
        let p = fit_to_page(595, 842, PageSize::A4);
        assert!((p.width - PageSize::A4.width_pt).abs() < 0.5);
        assert!(p.x.abs() < 0.5 && p.y.abs() < 0.5);
    }

    #[test]
    fn test_wide_capture_fits_width_and_centres_vertically() {
        let p = fit_to_page(1190, 600, PageSize::A4);
        assert!((p.width - PageSize::A4.width_pt).abs() < 1e-3);
        assert!(p.height < PageSize::A4.height_pt);
        assert!((p.y - (PageSize::A4.height_pt - p.height) / 2.0).abs() < 1e-3);
        assert!(p.x.abs() < 1e-3);
    }

    #[test]
    fn test_tall_capture_stays_on_one_page_centred() {
        // Three pages of content at page width
        let p = fit_to_page(595, 2526, PageSize::A4);
        assert!((p.height - PageSize::A4.height_pt).abs() < 1e-3);
        assert!(p.width < PageSize::A4.width_pt);
        assert!((p.x - (PageSize::A4.width_pt - p.width) / 2.0).abs() < 1e-3);
        assert!(p.y.abs() < 1e-3);
    }

    /// No pagination: an over-long capture is still exactly one page.
    #[test]
    fn test_tall_capture_yields_single_page_pdf() {
        let exported = to_pdf(&raster(60, 400), PageSize::A4, 80).unwrap();
        assert_eq!(exported.page_count, 1);

        let doc = Document::load_mem(&exported.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(exported.bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn test_embedded_image_is_jpeg() {
        let exported = to_pdf(&raster(20, 30), PageSize::A4, DEFAULT_JPEG_QUALITY).unwrap();
        let doc = Document::load_mem(&exported.bytes).unwrap();
        let jpeg = doc.objects.values().any(|o| {
            matches!(o, Object::Stream(s)
                if s.dict.get(b"Filter").ok() == Some(&Object::Name(b"DCTDecode".to_vec())))
        });
        assert!(jpeg);
    }
}
