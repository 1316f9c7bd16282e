//! External resources a visual tree needs at rasterization time.

use image::RgbImage;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::font::PageFont;
use crate::error::{Error, Result};
use crate::render::VisualTree;

/// Where image sources may be loaded from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssetPolicy {
    /// Any local path or http(s) URL; for input the operator controls (CLI arguments)
    #[default]
    Trusted,
    /// Public http(s) hosts only, plus files under `local_root` when one is set
    Untrusted { local_root: Option<PathBuf> },
}

/// A vetted place to read an image from
#[derive(Debug, PartialEq, Eq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10 carrier-grade NAT
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_internal_ip(IpAddr::V4(v4)))
        }
    }
}

fn rejected(source: &str, reason: &str) -> Error {
    Error::AssetRejected(format!("{source:?}: {reason}"))
}

impl AssetPolicy {
    /// Decide where `source` is read from, or reject it
    async fn locate(&self, source: &str) -> Result<Location> {
        match self {
            Self::Trusted if is_remote(source) => Url::parse(source)
                .map(Location::Remote)
                .map_err(|e| Error::ExportFailure(format!("missing asset {source:?}: {e}"))),
            Self::Trusted => Ok(Location::Local(PathBuf::from(source))),
            Self::Untrusted { .. } if is_remote(source) => {
                let url = Url::parse(source).map_err(|e| rejected(source, &e.to_string()))?;
                check_public_host(source, &url).await?;
                Ok(Location::Remote(url))
            }
            Self::Untrusted { local_root: None } => {
                Err(rejected(source, "only http(s) URLs are accepted"))
            }
            Self::Untrusted {
                local_root: Some(root),
            } => confine(source, root).await.map(Location::Local),
        }
    }
}

/// Reject hosts that name or resolve to loopback, private or link-local addresses
async fn check_public_host(source: &str, url: &Url) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| rejected(source, "URL has no host"))?
        .trim_start_matches('[')
        .trim_end_matches(']');

    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
        return Err(rejected(source, "host is not public"));
    }

    let addresses: Vec<IpAddr> = match host.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => {
            let port = url.port_or_known_default().unwrap_or(443);
            tokio::net::lookup_host((host, port))
                .await
                .map_err(|e| Error::ExportFailure(format!("missing asset {source:?}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
    };

    if addresses.iter().any(|ip| is_internal_ip(*ip)) {
        return Err(rejected(source, "host is not public"));
    }
    Ok(())
}

/// Resolve `source` inside `root`; `..` and symlinks may not lead out of it
async fn confine(source: &str, root: &Path) -> Result<PathBuf> {
    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| Error::ExportFailure(format!("asset directory {}: {e}", root.display())))?;

    let candidate = root.join(source.trim_start_matches('/'));
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|e| Error::ExportFailure(format!("missing asset {source:?}: {e}")))?;

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(rejected(source, "path leaves the asset directory"))
    }
}

/// Decoded images keyed by their source string, plus the page font
#[derive(Clone, Default)]
pub struct Assets {
    images: HashMap<String, RgbImage>,
    pub font: PageFont,
}

impl Assets {
    pub fn new(font: PageFont) -> Self {
        Self {
            images: HashMap::new(),
            font,
        }
    }

    pub fn insert_image(&mut self, source: impl Into<String>, image: RgbImage) {
        self.images.insert(source.into(), image);
    }

    pub fn image(&self, source: &str) -> Result<&RgbImage> {
        self.images
            .get(source)
            .ok_or_else(|| Error::ExportFailure(format!("missing asset {source:?}")))
    }

    /// Fetch and decode every image the tree refers to, as far as `policy` allows.
    pub async fn load(
        tree: &VisualTree,
        client: &Client,
        font: PageFont,
        policy: &AssetPolicy,
    ) -> Result<Self> {
        let mut assets = Self::new(font);

        for source in tree.image_sources() {
            if assets.images.contains_key(source) {
                continue;
            }

            let location = policy.locate(source).await.inspect_err(|e| {
                warn!("Refusing asset: {}", e);
            })?;
            let bytes = match location {
                Location::Remote(url) => fetch(client, url).await?,
                Location::Local(path) => tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::ExportFailure(format!("missing asset {source:?}: {e}")))?,
            };

            let image = image::load_from_memory(&bytes)
                .map_err(|e| Error::ExportFailure(format!("undecodable asset {source:?}: {e}")))?
                .to_rgb8();
            debug!("Loaded asset {} ({}x{})", source, image.width(), image.height());
            assets.insert_image(source, image);
        }

        Ok(assets)
    }
}

async fn fetch(client: &Client, url: Url) -> Result<Vec<u8>> {
    let shown = url.to_string();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::ExportFailure(format!("missing asset {shown:?}: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::ExportFailure(format!(
            "missing asset {shown:?}: HTTP {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::ExportFailure(format!("missing asset {shown:?}: {e}")))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn untrusted(root: Option<&Path>) -> AssetPolicy {
        AssetPolicy::Untrusted {
            local_root: root.map(Path::to_path_buf),
        }
    }

    #[tokio::test]
    async fn test_trusted_reads_any_path() {
        let location = AssetPolicy::Trusted.locate("/srv/logo.png").await.unwrap();
        assert_eq!(location, Location::Local(PathBuf::from("/srv/logo.png")));
    }

    #[tokio::test]
    async fn test_untrusted_rejects_local_paths_without_root() {
        let err = untrusted(None).locate("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::AssetRejected(_)));
        assert!(err.is_contract_violation());
    }

    #[tokio::test]
    async fn test_untrusted_rejects_internal_hosts() {
        let policy = untrusted(None);
        for source in [
            "http://127.0.0.1/logo.png",
            "http://localhost:8080/logo.png",
            "http://10.0.0.5/logo.png",
            "http://169.254.169.254/latest/meta-data",
            "http://[::1]/logo.png",
        ] {
            let err = policy.locate(source).await.unwrap_err();
            assert!(matches!(err, Error::AssetRejected(_)), "{source} was accepted");
        }
    }

    #[tokio::test]
    async fn test_untrusted_confines_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir(&assets).unwrap();
        std::fs::write(assets.join("logo.png"), b"png").unwrap();
        std::fs::write(dir.path().join("secret.png"), b"png").unwrap();

        let policy = untrusted(Some(&assets));
        let Location::Local(path) = policy.locate("logo.png").await.unwrap() else {
            panic!("expected a local file");
        };
        assert!(path.ends_with("logo.png"));

        let err = policy.locate("../secret.png").await.unwrap_err();
        assert!(matches!(err, Error::AssetRejected(_)));
    }

    #[test]
    fn test_internal_ip_classes() {
        assert!(is_internal_ip("192.168.1.10".parse().unwrap()));
        assert!(is_internal_ip("100.64.0.1".parse().unwrap()));
        assert!(is_internal_ip("::ffff:127.0.0.1".parse().unwrap()));
        assert!(is_internal_ip("fd00::1".parse().unwrap()));
        assert!(!is_internal_ip("93.184.216.34".parse().unwrap()));
    }
}
