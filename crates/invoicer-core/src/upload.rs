//! Object storage for exported artifacts.
//!
//! Uploads are content-addressed: the object key is derived from the bytes, so re-sharing an
//! unchanged export yields the same link.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{UploadConfig, UploadMode};
use crate::error::{Error, Result};

/// Key prefix for exported invoices
pub const OBJECT_PREFIX: &str = "invoices";

/// `invoices/<md5>.<extension>`
pub fn object_key(bytes: &[u8], extension: &str) -> String {
    format!("{OBJECT_PREFIX}/{:x}.{extension}", md5::compute(bytes))
}

/// Uploads a binary and returns a publicly reachable URL for it
#[async_trait]
pub trait Uploader: Send + Sync {
    fn name(&self) -> &str;

    async fn upload(&self, bytes: Bytes, content_type: &str, key: &str) -> Result<String>;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// HTTP PUT to `<endpoint>/<key>`
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    token: Option<String>,
    public_base_url: String,
}

impl HttpUploader {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        public_base_url: Option<String>,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::UploadFailure(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            public_base_url: public_base_url.unwrap_or_else(|| endpoint.clone()),
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, bytes: Bytes, content_type: &str, key: &str) -> Result<String> {
        let url = join_url(&self.endpoint, key);
        debug!("PUT {} ({} bytes)", url, bytes.len());

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::UploadFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UploadFailure(format!("HTTP {status}: {body}")));
        }

        let public = join_url(&self.public_base_url, key);
        info!("Uploaded {}", public);
        Ok(public)
    }
}

/// Writes into a local directory that is served under `public_base_url`
pub struct DirUploader {
    root: PathBuf,
    public_base_url: String,
}

impl DirUploader {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl Uploader for DirUploader {
    fn name(&self) -> &str {
        "directory"
    }

    async fn upload(&self, bytes: Bytes, _content_type: &str, key: &str) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::UploadFailure(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::UploadFailure(format!("{}: {e}", path.display())))?;

        debug!("Wrote {}", path.display());
        Ok(join_url(&self.public_base_url, key))
    }
}

/// Build the configured uploader; `None` when uploads are disabled
pub fn create_uploader(config: &UploadConfig) -> Result<Option<Arc<dyn Uploader>>> {
    let missing = |field: &str| Error::ConfigInvalid {
        field: format!("upload.{field}"),
        reason: "required for this upload mode".to_string(),
    };

    match config.mode {
        UploadMode::Disabled => Ok(None),
        UploadMode::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| missing("endpoint"))?;
            let uploader =
                HttpUploader::new(endpoint, config.token.clone(), config.public_base_url.clone())?;
            Ok(Some(Arc::new(uploader)))
        }
        UploadMode::Directory => {
            let directory = config.directory.clone().ok_or_else(|| missing("directory"))?;
            let base = config
                .public_base_url
                .clone()
                .ok_or_else(|| missing("public_base_url"))?;
            Ok(Some(Arc::new(DirUploader::new(directory, base))))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_object_key_is_content_addressed() {
        let a = object_key(b"%PDF-1.5 a", "pdf");
        assert!(a.starts_with("invoices/") && a.ends_with(".pdf"));
        assert_eq!(a, object_key(b"%PDF-1.5 a", "pdf"));
        assert_ne!(a, object_key(b"%PDF-1.5 b", "pdf"));
    }

    #[tokio::test]
    async fn test_http_upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/invoices/abc.pdf"))
            .and(header("content-type", "application/pdf"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let uploader = HttpUploader::new(
            format!("{}/bucket", server.uri()),
            Some("secret".to_string()),
            Some("https://cdn.example.com".to_string()),
        )
        .unwrap();

        let url = uploader
            .upload(Bytes::from_static(b"%PDF"), "application/pdf", "invoices/abc.pdf")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/invoices/abc.pdf");
    }

    #[tokio::test]
    async fn test_http_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let uploader = HttpUploader::new(server.uri(), None, None).unwrap();
        let err = uploader
            .upload(Bytes::from_static(b"x"), "application/pdf", "invoices/x.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UploadFailure(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn test_dir_upload_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = DirUploader::new(dir.path(), "http://localhost:3000/files/");
        let url = uploader
            .upload(Bytes::from_static(b"data"), "application/pdf", "invoices/k.pdf")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/files/invoices/k.pdf");
        assert_eq!(std::fs::read(dir.path().join("invoices/k.pdf")).unwrap(), b"data");
    }

    #[test]
    fn test_create_uploader_validates() {
        assert!(create_uploader(&UploadConfig::default()).unwrap().is_none());

        let config = UploadConfig {
            mode: UploadMode::Directory,
            directory: Some(PathBuf::from("/tmp/x")),
            ..UploadConfig::default()
        };
        assert!(matches!(
            create_uploader(&config),
            Err(Error::ConfigInvalid { .. })
        ));
    }
}
