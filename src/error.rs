//! Error types for the heic2raster library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`HeicError`]: **Fatal** for the operation that raised it: a single
//!   upload is rejected, a directory cannot be created, the adapter refused a
//!   file. Returned as `Err(HeicError)` from single-file operations.
//!
//! * [`FileFailure`]: **Non-fatal**: one member of a batch failed while the
//!   others carried on. Stored inside [`crate::output::BatchReport`] so a
//!   caller sees every per-file outcome instead of losing the batch to one
//!   bad file.
//!
//! [`ErrorKind`] is the coarse taxonomy used on the wire, so clients can
//! branch on the kind and show the message as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the heic2raster library.
#[derive(Debug, Error)]
pub enum HeicError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no file.
    #[error("No file uploaded")]
    MissingFile,

    /// The uploaded file does not carry an accepted source extension.
    #[error("Only {accepted} files are allowed (got '{name}')")]
    UnsupportedSource { name: String, accepted: String },

    /// The requested target format is not one of the supported encodings.
    #[error("Unsupported target format '{format}'. Supported: jpeg, png")]
    UnsupportedFormat { format: String },

    /// A file name that is not a single plain path component.
    #[error("Invalid file name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Retry was requested for a job that has not failed.
    #[error("Job {id} is {status} and cannot be retried (only failed jobs can)")]
    RetryNotAllowed { id: u64, status: String },

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// No job with this identifier is tracked.
    #[error("Job {id} not found")]
    JobNotFound { id: u64 },

    /// The source a job refers to is no longer in the inbox.
    #[error("Source file '{name}' no longer exists in the inbox")]
    SourceGone { name: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The converter adapter failed. Display is the adapter message verbatim.
    #[error("{message}")]
    Conversion { source_name: String, message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem operation failed.
    #[error("Failed to {op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some items of a bulk operation failed while others succeeded.
    #[error("{} of {attempted} entries failed: {}", .failures.len(), summarize(.failures))]
    PartialFailure {
        attempted: usize,
        failures: Vec<FileFailure>,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HeicError {
    /// Build an [`HeicError::Io`] for the given operation and path.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HeicError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeicError::MissingFile
            | HeicError::UnsupportedSource { .. }
            | HeicError::UnsupportedFormat { .. }
            | HeicError::InvalidName { .. }
            | HeicError::RetryNotAllowed { .. } => ErrorKind::Validation,
            HeicError::JobNotFound { .. } | HeicError::SourceGone { .. } => ErrorKind::NotFound,
            HeicError::Conversion { .. } => ErrorKind::Conversion,
            HeicError::Io { .. } => ErrorKind::Io,
            HeicError::PartialFailure { .. } => ErrorKind::PartialFailure,
            HeicError::InvalidConfig(_) => ErrorKind::Config,
            HeicError::Internal(_) => ErrorKind::Internal,
        }
    }
}

fn summarize(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.source, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error taxonomy shared by the library, the HTTP layer and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Io,
    Conversion,
    PartialFailure,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
            ErrorKind::Conversion => "conversion",
            ErrorKind::PartialFailure => "partial_failure",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A non-fatal failure for a single entry of a batch.
///
/// `source` is the inbox (or outbox, for clears) entry name; `reason` is the
/// human-readable cause, passed through untouched from the adapter when the
/// failure came from a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub source: String,
    pub reason: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

impl FileFailure {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: reason.into(),
        }
    }
}
