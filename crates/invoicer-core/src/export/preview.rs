//! Lossy preview thumbnails.

use image::imageops::FilterType;
use webp::Encoder as WebpEncoder;

use super::raster::RasterImage;
use crate::error::{Error, Result};

pub const PREVIEW_CONTENT_TYPE: &str = "image/webp";

/// Default preview width in pixels
pub const DEFAULT_PREVIEW_WIDTH: u32 = 800;

const PREVIEW_QUALITY: f32 = 80.0;

/// Encode `raster` as a lossy WebP no wider than `max_width`
pub fn render_preview_webp(raster: &RasterImage, max_width: u32) -> Result<Vec<u8>> {
    if max_width == 0 {
        return Err(Error::ExportFailure("preview width must be positive".to_string()));
    }

    let resized;
    let image = if raster.width() > max_width {
        let height = u64::from(raster.height()) * u64::from(max_width) / u64::from(raster.width());
        let height = u32::try_from(height).unwrap_or(u32::MAX).max(1);
        resized = image::imageops::resize(&raster.image, max_width, height, FilterType::Triangle);
        &resized
    } else {
        &raster.image
    };

    let encoded = WebpEncoder::from_rgb(image.as_raw(), image.width(), image.height()).encode(PREVIEW_QUALITY);
    Ok(encoded.to_vec())
}
