//! Output naming: the contract between inbox and outbox entries.
//!
//! The outbox is keyed by a name derived from the source name alone, never
//! from a job id. Re-converting the same source therefore overwrites its
//! previous artifact, and differently named sources never collide.

use crate::config::{source_extension_of, TargetFormat};

/// Strip a recognised source extension from `name`.
///
/// Returns `name` unchanged when it does not end in one of `source_extensions`.
pub fn strip_source_extension<'a>(name: &'a str, source_extensions: &[String]) -> &'a str {
    match source_extension_of(name, source_extensions) {
        // The matched extension is ASCII, so its byte length is exact.
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

/// Derive the artifact name for `source_name` converted to `format`.
///
/// A recognised source extension is replaced; otherwise the target extension
/// is appended, so `photo` → `photo.png` and `photo.png` → `photo.png.png`.
pub fn output_name(source_name: &str, format: TargetFormat, source_extensions: &[String]) -> String {
    format!(
        "{}.{}",
        strip_source_extension(source_name, source_extensions),
        format.extension()
    )
}
