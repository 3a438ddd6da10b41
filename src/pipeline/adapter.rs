//! The converter seam: source file + target format → encoded bytes.
//!
//! The orchestrator treats a [`Converter`] as a black box with a latency and
//! a failure mode. Whatever message the converter fails with is handed to the
//! caller untouched.
//!
//! Two implementations ship with the crate:
//!
//! * [`CommandConverter`]: runs an external HEIF decoder (`heif-convert`
//!   from libheif by default) and reads back the file it writes. This is what
//!   the binary uses, since HEVC-coded HEIC needs a native decoder.
//! * [`ImageConverter`]: decodes in-process with the `image` crate and
//!   re-encodes via [`crate::pipeline::encode`]. Only handles inputs `image`
//!   can read, which makes it the adapter of choice for tests and for
//!   sources that are already raster images under a HEIC name.

use crate::config::TargetFormat;
use crate::pipeline::encode::encode_image;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default external decoder program.
pub const DEFAULT_HEIF_PROGRAM: &str = "heif-convert";

/// A converter failure. Display is the message as the converter produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConverterError {
    pub message: String,
}

impl ConverterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Re-encodes one source file into a target format.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name for logs and `Debug` output.
    fn name(&self) -> &str;

    /// Convert the file at `source` and return the encoded bytes.
    async fn convert(&self, source: &Path, format: TargetFormat) -> Result<Vec<u8>, ConverterError>;
}

// ── In-process adapter ───────────────────────────────────────────────────

/// Decodes with the `image` crate, encodes with [`encode_image`].
#[derive(Debug, Clone)]
pub struct ImageConverter {
    jpeg_quality: u8,
}

impl ImageConverter {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new(90)
    }
}

#[async_trait]
impl Converter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    async fn convert(&self, source: &Path, format: TargetFormat) -> Result<Vec<u8>, ConverterError> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| ConverterError::new(format!("Failed to read source: {e}")))?;
        let quality = self.jpeg_quality;

        // Decoding and encoding are CPU-bound; keep them off the async workers.
        tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&bytes)
                .map_err(|e| ConverterError::new(format!("Failed to decode image: {e}")))?;
            encode_image(&img, format, quality)
                .map_err(|e| ConverterError::new(format!("Failed to encode {format}: {e}")))
        })
        .await
        .map_err(|e| ConverterError::new(format!("Conversion task panicked: {e}")))?
    }
}

// ── External-program adapter ─────────────────────────────────────────────

/// Runs `<program> -q <quality> <source> <output>` and reads `<output>`.
///
/// The output path lives in a fresh temporary directory that is removed when
/// the call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    jpeg_quality: u8,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            jpeg_quality: 90,
        }
    }

    pub fn with_jpeg_quality(mut self, q: u8) -> Self {
        self.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::new(DEFAULT_HEIF_PROGRAM)
    }
}

#[async_trait]
impl Converter for CommandConverter {
    fn name(&self) -> &str {
        "command"
    }

    async fn convert(&self, source: &Path, format: TargetFormat) -> Result<Vec<u8>, ConverterError> {
        let work_dir = TempDir::new()
            .map_err(|e| ConverterError::new(format!("Failed to create work directory: {e}")))?;
        let output = work_dir.path().join(format!("out.{}", format.extension()));

        debug!(
            program = %self.program.display(),
            source = %source.display(),
            format = %format,
            "Invoking external converter"
        );

        let result = Command::new(&self.program)
            .arg("-q")
            .arg(self.jpeg_quality.to_string())
            .arg(source)
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ConverterError::new(format!(
                    "Failed to run '{}': {e}",
                    self.program.display()
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("'{}' exited with {}", self.program.display(), result.status)
            } else {
                stderr
            };
            return Err(ConverterError::new(message));
        }

        tokio::fs::read(&output).await.map_err(|e| {
            ConverterError::new(format!(
                "'{}' reported success but produced no output: {e}",
                self.program.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([0, 128, 255])));
        let bytes = encode_image(&img, TargetFormat::Png, 90).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn image_converter_produces_target_format() {
        let tmp = TempDir::new().unwrap();
        let src = write_png(tmp.path(), "sample.heic");

        let out = ImageConverter::default()
            .convert(&src, TargetFormat::Jpeg)
            .await
            .expect("conversion should succeed");
        let guessed = image::guess_format(&out).unwrap();
        assert_eq!(guessed, image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn image_converter_reports_undecodable_input() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("junk.heic");
        std::fs::write(&src, b"definitely not an image").unwrap();

        let err = ImageConverter::default()
            .convert(&src, TargetFormat::Png)
            .await
            .unwrap_err();
        assert!(err.message.starts_with("Failed to decode image"), "got: {err}");
    }

    #[tokio::test]
    async fn command_converter_missing_program_fails() {
        let tmp = TempDir::new().unwrap();
        let src = write_png(tmp.path(), "a.heic");

        let err = CommandConverter::new("/definitely/not/a/real/heif-convert")
            .convert(&src, TargetFormat::Png)
            .await
            .unwrap_err();
        assert!(err.message.contains("Failed to run"), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_converter_passes_stderr_through() {
        let tmp = TempDir::new().unwrap();
        let src = write_png(tmp.path(), "a.heic");

        // `sh -q ...` is rejected by the shell itself with a message on stderr.
        let err = CommandConverter::new("sh")
            .convert(&src, TargetFormat::Png)
            .await
            .unwrap_err();
        assert!(!err.message.is_empty());
    }
}
