//! Image encoding: `DynamicImage` → JPEG or PNG bytes.
//!
//! JPEG has no alpha channel, so images are flattened to RGB8 first; feeding
//! an RGBA buffer to the JPEG encoder is an error rather than a silent drop.
//! PNG keeps whatever colour type the decoder produced.

use crate::config::TargetFormat;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode `img` in `format`. `jpeg_quality` (1–100) is ignored for PNG.
pub fn encode_image(
    img: &DynamicImage,
    format: TargetFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        TargetFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        TargetFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
    }

    debug!(
        format = %format,
        width = img.width(),
        height = img.height(),
        bytes = buf.len(),
        "Encoded image"
    );
    Ok(buf)
}
