//! Configuration types for the conversion service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The HTTP layer, the CLI and the tests all
//! share the same struct. Most callers set only the two directories and take
//! the documented defaults for the rest.

use crate::error::HeicError;
use crate::pipeline::adapter::Converter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use heic2raster::{ServiceConfig, TargetFormat};
///
/// let config = ServiceConfig::builder()
///     .inbox_dir("/tmp/heic/uploads")
///     .outbox_dir("/tmp/heic/converted")
///     .concurrency(8)
///     .default_format(TargetFormat::Png)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory holding uploaded source files, keyed by original name. Default: `uploads`.
    pub inbox_dir: PathBuf,

    /// Directory holding converted artifacts, keyed by derived name. Default: `converted`.
    pub outbox_dir: PathBuf,

    /// Optional directory of static UI assets served at `/`. Default: None.
    pub public_dir: Option<PathBuf>,

    /// URL prefix under which artifacts are retrievable. Default: `/converted`.
    pub public_prefix: String,

    /// Upper bound on conversions running at once during a batch. Default: 4.
    ///
    /// HEIC decoding is memory hungry (a 12 MP photo decodes to ~48 MB of
    /// RGBA). The bound is independent of inbox size.
    pub concurrency: usize,

    /// Format used when a request does not name one. Default: [`TargetFormat::Jpeg`].
    pub default_format: TargetFormat,

    /// JPEG encoder quality, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Largest accepted upload body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Accepted source extensions, lowercase and without the dot. Default: `heic`, `heif`.
    pub source_extensions: Vec<String>,

    /// Pre-constructed converter adapter. When None, the orchestrator runs
    /// [`crate::pipeline::adapter::CommandConverter`] at `jpeg_quality`.
    pub converter: Option<Arc<dyn Converter>>,

    /// Receives per-file batch events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("uploads"),
            outbox_dir: PathBuf::from("converted"),
            public_dir: None,
            public_prefix: "/converted".to_string(),
            concurrency: 4,
            default_format: TargetFormat::default(),
            jpeg_quality: 90,
            max_upload_bytes: 50 * 1024 * 1024,
            source_extensions: vec!["heic".to_string(), "heif".to_string()],
            converter: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("inbox_dir", &self.inbox_dir)
            .field("outbox_dir", &self.outbox_dir)
            .field("public_dir", &self.public_dir)
            .field("public_prefix", &self.public_prefix)
            .field("concurrency", &self.concurrency)
            .field("default_format", &self.default_format)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("source_extensions", &self.source_extensions)
            .field("converter", &self.converter.as_ref().map(|c| c.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when `name` ends in one of the accepted source extensions
    /// (case-insensitive).
    pub fn accepts_source(&self, name: &str) -> bool {
        source_extension_of(name, &self.source_extensions).is_some()
    }

    /// Human-readable list of accepted extensions, e.g. `.HEIC/.HEIF`.
    pub fn accepted_extensions(&self) -> String {
        self.source_extensions
            .iter()
            .map(|e| format!(".{}", e.to_uppercase()))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Public locator for an artifact name.
    pub fn locator(&self, name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), name)
    }
}

/// Return the accepted extension `name` ends with, if any.
pub(crate) fn source_extension_of<'a>(name: &str, accepted: &'a [String]) -> Option<&'a str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    accepted.iter().find(|a| **a == ext).map(String::as_str)
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn inbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.inbox_dir = dir.into();
        self
    }

    pub fn outbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.outbox_dir = dir.into();
        self
    }

    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.public_dir = Some(dir.into());
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = prefix.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn default_format(mut self, format: TargetFormat) -> Self {
        self.config.default_format = format;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Replace the accepted source extensions. Leading dots are stripped and
    /// the values lowercased.
    pub fn source_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.source_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, HeicError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(HeicError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(HeicError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.inbox_dir == c.outbox_dir {
            return Err(HeicError::InvalidConfig(format!(
                "Inbox and outbox must be different directories (both are '{}')",
                c.inbox_dir.display()
            )));
        }
        if !c.public_prefix.starts_with('/') {
            return Err(HeicError::InvalidConfig(format!(
                "Public prefix must start with '/', got '{}'",
                c.public_prefix
            )));
        }
        if c.public_prefix.trim_end_matches('/').is_empty() {
            return Err(HeicError::InvalidConfig(
                "Public prefix must name a path below '/'".into(),
            ));
        }
        if c.source_extensions.is_empty() {
            return Err(HeicError::InvalidConfig(
                "At least one source extension is required".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(HeicError::InvalidConfig(
                "Maximum upload size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Raster encodings an upload can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Lossy, small files; what phones and browsers expect. (default)
    #[default]
    Jpeg,
    /// Lossless, keeps transparency.
    Png,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 2] = [TargetFormat::Jpeg, TargetFormat::Png];

    /// Wire token, as accepted by the HTTP surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            TargetFormat::Jpeg => image::ImageFormat::Jpeg,
            TargetFormat::Png => image::ImageFormat::Png,
        }
    }

    /// Parse an optional request value: absent or blank selects `default`,
    /// anything else must name a supported format.
    pub fn parse_or(value: Option<&str>, default: TargetFormat) -> Result<Self, HeicError> {
        match value.map(str::trim) {
            None | Some("") => Ok(default),
            Some(v) => v.parse(),
        }
    }

    /// Batch-endpoint parsing: `png` selects PNG, every other value
    /// (including none) collapses to JPEG.
    pub fn png_or_jpeg(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("png") => TargetFormat::Png,
            _ => TargetFormat::Jpeg,
        }
    }
}

impl FromStr for TargetFormat {
    type Err = HeicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            _ => Err(HeicError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
