//! Value types produced by the storage layer and the conversion pipeline.

use crate::error::FileFailure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an ingested source file.
///
/// Original name plus a monotonic sequence number, so two uploads of
/// `photo.heic` are told apart while still being reproducible in tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub(crate) fn next(name: &str) -> Self {
        let seq = NEXT_SOURCE_SEQ.fetch_add(1, Ordering::Relaxed);
        SourceId(format!("{name}#{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of an inbox or outbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// An uploaded file persisted in the inbox. Never rewritten after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: SourceId,
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

impl SourceFile {
    /// Adopt an existing inbox entry (e.g. one found by a batch listing).
    pub fn from_entry(entry: StoredEntry) -> Self {
        Self {
            id: SourceId::next(&entry.name),
            name: entry.name,
            size: entry.size,
            path: entry.path,
        }
    }
}

/// A converted file persisted in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
    /// Public URL path the artifact is served under, e.g. `/converted/a.png`.
    pub locator: String,
}

/// Catalog view of one artifact, as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    pub name: String,
    pub download_url: String,
}

/// Aggregate result of a batch conversion.
///
/// `succeeded + failed.len()` always equals the number of inbox entries the
/// batch saw. `failed` is ordered by source name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<FileFailure>,
    /// Artifacts written by this batch, ordered by name.
    #[serde(skip)]
    pub artifacts: Vec<Artifact>,
}

impl BatchReport {
    /// Number of entries attempted.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of a successful bulk clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub removed_sources: usize,
    pub removed_artifacts: usize,
}
