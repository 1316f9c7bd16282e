use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Language codes following ISO 639-1, with script subtags where needed (`gu-Latn`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn default_source_lang() -> Lang {
    Lang::new(DEFAULT_SOURCE_LANG)
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

fn default_mixed_script_lang() -> Lang {
    Lang::new(DEFAULT_MIXED_SCRIPT_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An sRGB color, serialized as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    pub const fn navy() -> Self {
        Self::new(0x1e, 0x3a, 0x5f)
    }

    pub const fn slate() -> Self {
        Self::new(0x47, 0x55, 0x69)
    }

    pub const fn light_gray() -> Self {
        Self::new(0xf1, 0xf5, 0xf9)
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Result<Self> {
        let hex = text.trim().trim_start_matches('#');
        let invalid = || Error::ConfigInvalid {
            field: "color".to_string(),
            reason: format!("{text:?} is not a #rrggbb color"),
        };

        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Components in the 0.0-1.0 range, as PDF color operators expect.
    pub fn to_unit(self) -> (f32, f32, f32) {
        (
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Translator backend configuration for OpenAI-compatible APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Overall deadline for one translation, retries included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranslatorConfig {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            ..Default::default()
        }
    }
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/v1".to_string(),
            api_key: None,
            model: "default_model".to_string(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Description store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Keep a read-through memory cache of exact lookups
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    /// Maximum memory cache entries
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,

    /// Memory cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub memory_ttl_seconds: u64,

    /// Persist entries on disk (otherwise process-local only)
    #[serde(default = "default_true")]
    pub disk_enabled: bool,

    /// Disk store directory (defaults to ~/.cache/invoicer/descriptions)
    pub disk_path: Option<PathBuf>,

    /// Maximum suggestions returned for autocomplete
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_entries() -> u64 {
    1000
}

const fn default_suggestion_limit() -> usize {
    8
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_entries: default_memory_max_entries(),
            memory_ttl_seconds: 0,
            disk_enabled: true,
            disk_path: None,
            suggestion_limit: default_suggestion_limit(),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Raster scale factor (pixels per PDF point)
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// JPEG quality used when embedding the raster into the PDF
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// TrueType font with target-script coverage; Helvetica (Latin only) when unset
    pub font_path: Option<PathBuf>,

    /// Directory the web server may read local logos from; only http(s) logos when unset
    pub asset_dir: Option<PathBuf>,

    /// Prefix amounts with the currency glyph
    #[serde(default = "default_true")]
    pub currency_symbol: bool,

    /// Print amounts with target-script digits
    #[serde(default)]
    pub target_script_digits: bool,

    /// Print translated descriptions under the canonical ones
    #[serde(default = "default_true")]
    pub bilingual_descriptions: bool,
}

const fn default_render_scale() -> f32 {
    2.0
}

const fn default_jpeg_quality() -> u8 {
    92
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            render_scale: default_render_scale(),
            jpeg_quality: default_jpeg_quality(),
            font_path: None,
            asset_dir: None,
            currency_symbol: true,
            target_script_digits: false,
            bilingual_descriptions: true,
        }
    }
}

/// Share message configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

fn default_message_template() -> String {
    crate::share::DEFAULT_MESSAGE_TEMPLATE.to_string()
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            message_template: default_message_template(),
        }
    }
}

/// Where exported artifacts are uploaded for sharing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    #[default]
    Disabled,
    /// HTTP PUT to `endpoint`
    Http,
    /// Copy into `directory`, served from `public_base_url`
    Directory,
}

/// Upload configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub mode: UploadMode,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub public_base_url: Option<String>,
    pub directory: Option<PathBuf>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Canonical (source) language of descriptions
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language for translated descriptions
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Pseudo-language used to request the mixed-script transliteration
    #[serde(default = "default_mixed_script_lang")]
    pub mixed_script_lang: Lang,

    /// GST rate in percent
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub share: ShareConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

const fn default_tax_rate() -> f64 {
    crate::numeric::GST_RATE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            mixed_script_lang: default_mixed_script_lang(),
            tax_rate: default_tax_rate(),
            translator: TranslatorConfig::default(),
            store: StoreConfig::default(),
            export: ExportConfig::default(),
            share: ShareConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

/// Environment variable prefix for overrides (`INVOICER_TRANSLATOR__API_KEY=...`)
pub const ENV_PREFIX: &str = "INVOICER";

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/invoicer/config.toml, ./config.toml),
    /// then apply `INVOICER_*` environment overrides.
    pub fn load() -> Self {
        match Self::load_layered() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    fn load_layered() -> Result<Self> {
        let mut builder = config::Config::builder();

        let mut candidates = Vec::new();
        if let Some(config_dir) = crate::util::config_dir() {
            candidates.push(config_dir.join("invoicer").join("config.toml"));
        }
        candidates.push(PathBuf::from("config.toml"));

        for path in candidates.into_iter().filter(|p| p.exists()) {
            tracing::debug!("Loading config from {}", path.display());
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make rendering or tax computation meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.tax_rate.is_finite() || self.tax_rate < 0.0 {
            return Err(Error::ConfigInvalid {
                field: "tax_rate".to_string(),
                reason: format!("{} is not a non-negative percentage", self.tax_rate),
            });
        }
        if !self.export.render_scale.is_finite() || self.export.render_scale <= 0.0 {
            return Err(Error::ConfigInvalid {
                field: "export.render_scale".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(Error::ConfigInvalid {
                field: "export.jpeg_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }
        if self.upload.mode == UploadMode::Http && self.upload.endpoint.is_none() {
            return Err(Error::ConfigInvalid {
                field: "upload.endpoint".to_string(),
                reason: "required when upload.mode = \"http\"".to_string(),
            });
        }
        if self.upload.mode == UploadMode::Directory && self.upload.directory.is_none() {
            return Err(Error::ConfigInvalid {
                field: "upload.directory".to_string(),
                reason: "required when upload.mode = \"directory\"".to_string(),
            });
        }
        Ok(())
    }
}

/// Default canonical language code
pub const DEFAULT_SOURCE_LANG: &str = "en";
/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "gu";
/// Default mixed-script pseudo-language code
pub const DEFAULT_MIXED_SCRIPT_LANG: &str = "gu-Latn";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.source_lang.as_str(), "en");
        assert_eq!(config.target_lang.as_str(), "gu");
        assert_eq!(config.tax_rate, 18.0);
        assert_eq!(config.translator.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rgb_hex() {
        let color = Rgb::from_hex("#1E3A5F").unwrap();
        assert_eq!(color, Rgb::navy());
        assert_eq!(color.to_hex(), "#1e3a5f");
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("zzzzzz").is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            tax_rate = 12.0

            [translator]
            api_base = "https://api.example.com/v1"
            model = "gpt-4o-mini"

            [upload]
            mode = "directory"
            directory = "/tmp/invoices"
            "#,
        )
        .unwrap();

        assert_eq!(config.tax_rate, 12.0);
        assert_eq!(config.translator.retry_count, 3);
        assert_eq!(config.upload.mode, UploadMode::Directory);
        assert_eq!(config.export.jpeg_quality, 92);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.export.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.mode = UploadMode::Http;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tax_rate = f64::NAN;
        assert!(config.validate().is_err());
    }
}
