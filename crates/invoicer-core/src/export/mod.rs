//! Export of visual trees to PDF, editable documents, previews and share links.
//!
//! Everything CPU-bound (layout, MuPDF rasterization, JPEG and WebP encoding) runs on the
//! blocking pool. Sharing uploads only after the PDF has been fully produced, so a failed
//! export never leaves a partial object behind.

mod assets;
mod font;
mod layout;
mod markup;
mod pdf;
mod preview;
mod raster;

pub use assets::{AssetPolicy, Assets};
pub use font::{EmbeddedFont, PageFont};
pub use layout::{VectorPage, layout_page};
pub use markup::{DOC_CONTENT_TYPE, DOC_EXTENSION, MarkupDocument, to_simple_document};
pub use pdf::{DEFAULT_JPEG_QUALITY, ExportedPdf, PDF_CONTENT_TYPE, Placement, fit_to_page, to_pdf};
pub use preview::{DEFAULT_PREVIEW_WIDTH, PREVIEW_CONTENT_TYPE, render_preview_webp};
pub use raster::{DEFAULT_RENDER_SCALE, RasterImage, ViewportGuard, page_width_px, rasterize};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::document::Invoice;
use crate::error::{Error, Result};
use crate::render::{PageSize, VisualTree};
use crate::share::{ShareVariables, build_share_message, whatsapp_url};
use crate::upload::{Uploader, object_key};

/// Timeout for fetching remote assets such as logos
const ASSET_TIMEOUT: Duration = Duration::from_secs(20);

/// Result of a successful share
#[derive(Debug, Clone, Serialize)]
pub struct ShareOutcome {
    /// Object key the PDF was stored under
    pub key: String,
    /// Public URL of the uploaded PDF
    pub url: String,
    /// Message with placeholders substituted
    pub message: String,
    /// Messaging deep link carrying `message`
    pub whatsapp_url: String,
}

/// Turns visual trees into deliverables
pub struct ExportPipeline {
    client: Client,
    font: PageFont,
    page: PageSize,
    scale: f32,
    jpeg_quality: u8,
    message_template: String,
    uploader: Option<Arc<dyn Uploader>>,
    policy: AssetPolicy,
}

fn asset_client(follow_redirects: bool) -> Result<Client> {
    let redirects = if follow_redirects {
        reqwest::redirect::Policy::default()
    } else {
        reqwest::redirect::Policy::none()
    };
    Client::builder()
        .timeout(ASSET_TIMEOUT)
        .redirect(redirects)
        .build()
        .map_err(|e| Error::ExportFailure(format!("Failed to create HTTP client: {e}")))
}

impl ExportPipeline {
    /// Create a pipeline from configuration.
    ///
    /// Loads `export.font_path` when set; without it pages are drawn with the builtin Latin font.
    pub fn new(config: &AppConfig, uploader: Option<Arc<dyn Uploader>>) -> Result<Self> {
        let font = match &config.export.font_path {
            Some(path) => {
                info!("Using page font {}", path.display());
                PageFont::Embedded(Arc::new(EmbeddedFont::from_file(path)?))
            }
            None => PageFont::Builtin,
        };

        let client = asset_client(true)?;

        Ok(Self {
            client,
            font,
            page: PageSize::A4,
            scale: config.export.render_scale,
            jpeg_quality: config.export.jpeg_quality,
            message_template: config.share.message_template.clone(),
            uploader,
            policy: AssetPolicy::Trusted,
        })
    }

    /// Restrict where image sources may be read from.
    ///
    /// Under [`AssetPolicy::Untrusted`] redirects are not followed, since a public host could
    /// otherwise bounce the fetch to an internal one.
    pub fn with_asset_policy(mut self, policy: AssetPolicy) -> Result<Self> {
        self.client = asset_client(policy == AssetPolicy::Trusted)?;
        self.policy = policy;
        Ok(self)
    }

    #[must_use]
    pub fn with_font(mut self, font: PageFont) -> Self {
        self.font = font;
        self
    }

    pub const fn page(&self) -> PageSize {
        self.page
    }

    pub const fn scale(&self) -> f32 {
        self.scale
    }

    pub fn has_uploader(&self) -> bool {
        self.uploader.is_some()
    }

    /// Fetch every asset `tree` refers to
    pub async fn load_assets(&self, tree: &VisualTree) -> Result<Assets> {
        Assets::load(tree, &self.client, self.font.clone(), &self.policy).await
    }

    /// Rasterize `tree` at page width
    pub async fn capture(&self, tree: &VisualTree) -> Result<RasterImage> {
        let assets = self.load_assets(tree).await?;
        let mut tree = tree.clone();
        let (page, scale) = (self.page, self.scale);

        blocking(move || rasterize(&mut tree, page, scale, &assets)).await
    }

    /// Export `tree` as a single-page PDF
    pub async fn export_pdf(&self, tree: &VisualTree) -> Result<ExportedPdf> {
        let assets = self.load_assets(tree).await?;
        let mut tree = tree.clone();
        let (page, scale, quality) = (self.page, self.scale, self.jpeg_quality);

        let exported = blocking(move || {
            let raster = rasterize(&mut tree, page, scale, &assets)?;
            debug!("Captured {}x{} px", raster.width(), raster.height());
            to_pdf(&raster, page, quality)
        })
        .await?;

        info!("Exported PDF ({} bytes)", exported.bytes.len());
        Ok(exported)
    }

    /// Export `tree` as an editable Word-compatible document
    pub fn export_document(&self, tree: &VisualTree) -> Result<MarkupDocument> {
        to_simple_document(tree)
    }

    /// Lossy WebP preview of `tree`, at most `max_width` pixels wide
    pub async fn preview(&self, tree: &VisualTree, max_width: u32) -> Result<Vec<u8>> {
        let raster = self.capture(tree).await?;
        blocking(move || render_preview_webp(&raster, max_width)).await
    }

    /// Export, upload and build the share message and link.
    ///
    /// `message_template` overrides the configured template. Nothing is uploaded unless the
    /// PDF was produced.
    pub async fn share(
        &self,
        invoice: &Invoice,
        tree: &VisualTree,
        message_template: Option<&str>,
    ) -> Result<ShareOutcome> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| Error::UploadFailure("uploads are not configured".to_string()))?;

        // Fails on a non-finite total, so resolve it before anything is uploaded
        let mut variables = ShareVariables::for_invoice(invoice, String::new())?;

        let exported = self.export_pdf(tree).await?;
        let key = object_key(&exported.bytes, "pdf");
        let url = uploader
            .upload(Bytes::from(exported.bytes), PDF_CONTENT_TYPE, &key)
            .await?;
        info!("Uploaded {} via {}", key, uploader.name());

        variables.invoice_link.clone_from(&url);
        let template = message_template.unwrap_or(&self.message_template);
        let message = build_share_message(template, &variables.into_map());

        Ok(ShareOutcome {
            key,
            whatsapp_url: whatsapp_url(&message),
            url,
            message,
        })
    }
}

/// Run CPU-bound export work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::ExportFailure(format!("export task failed: {e}")))?
}
