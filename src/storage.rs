//! Storage manager: the inbox and outbox directories.
//!
//! Both directories are flat and keyed by file name, and together they are
//! the whole persisted state. There is no index or database: listing the
//! outbox *is* the catalog, so it survives restarts for free.
//!
//! Writes go to a hidden temp file in the target directory and are renamed
//! into place, so a listing never shows a half-written file. Same-name writes
//! overwrite (latest upload wins).

use crate::config::ServiceConfig;
use crate::error::{FileFailure, HeicError};
use crate::output::{Artifact, ClearReport, SourceFile, SourceId, StoredEntry};
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, info, warn};

/// Prefix of in-flight temp files. Never listed, never accepted as a name.
const TMP_PREFIX: &str = ".heic2raster-";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Owns the on-disk representation of sources and artifacts.
#[derive(Debug, Clone)]
pub struct StorageManager {
    inbox: PathBuf,
    outbox: PathBuf,
    public_prefix: String,
}

impl StorageManager {
    pub fn new(
        inbox: impl Into<PathBuf>,
        outbox: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> Self {
        Self {
            inbox: inbox.into(),
            outbox: outbox.into(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.inbox_dir.clone(),
            config.outbox_dir.clone(),
            config.public_prefix.clone(),
        )
    }

    pub fn inbox_dir(&self) -> &Path {
        &self.inbox
    }

    pub fn outbox_dir(&self) -> &Path {
        &self.outbox
    }

    /// Public locator for an outbox name.
    pub fn locator(&self, name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), name)
    }

    /// Create the inbox and outbox if absent. Idempotent.
    pub async fn ensure_directories(&self) -> Result<(), HeicError> {
        for dir in [&self.inbox, &self.outbox] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| HeicError::io("create directory", dir, e))?;
        }
        debug!(inbox = %self.inbox.display(), outbox = %self.outbox.display(), "Storage directories ready");
        Ok(())
    }

    /// Write an uploaded source into the inbox, replacing any same-name entry.
    pub async fn persist_source(&self, name: &str, bytes: &[u8]) -> Result<SourceFile, HeicError> {
        validate_name(name)?;
        let path = write_atomic(&self.inbox, name, bytes).await?;
        info!(name = %name, size_bytes = bytes.len(), "Source persisted");
        Ok(SourceFile {
            id: SourceId::next(name),
            name: name.to_string(),
            size: bytes.len() as u64,
            path,
        })
    }

    /// Write a converted artifact into the outbox, replacing any same-name entry.
    pub async fn write_artifact(&self, output_name: &str, bytes: &[u8]) -> Result<Artifact, HeicError> {
        validate_name(output_name)?;
        let path = write_atomic(&self.outbox, output_name, bytes).await?;
        debug!(name = %output_name, size_bytes = bytes.len(), "Artifact written");
        Ok(Artifact {
            name: output_name.to_string(),
            size: bytes.len() as u64,
            path,
            locator: self.locator(output_name),
        })
    }

    /// Snapshot of the inbox, sorted by name.
    pub async fn list_inbox(&self) -> Result<Vec<StoredEntry>, HeicError> {
        list_dir(&self.inbox).await
    }

    /// Snapshot of the outbox, sorted by name.
    pub async fn list_outbox(&self) -> Result<Vec<StoredEntry>, HeicError> {
        list_dir(&self.outbox).await
    }

    pub async fn inbox_exists(&self, name: &str) -> Result<bool, HeicError> {
        exists(&self.inbox, name).await
    }

    pub async fn outbox_exists(&self, name: &str) -> Result<bool, HeicError> {
        exists(&self.outbox, name).await
    }

    /// Remove an inbox entry. Returns whether something was removed;
    /// an absent entry is not an error.
    pub async fn delete_inbox(&self, name: &str) -> Result<bool, HeicError> {
        remove(&self.inbox, name).await
    }

    /// Remove an outbox entry. Returns whether something was removed;
    /// an absent entry is not an error.
    pub async fn delete_outbox(&self, name: &str) -> Result<bool, HeicError> {
        remove(&self.outbox, name).await
    }

    /// Delete every entry of both directories.
    ///
    /// Keeps sweeping past individual failures; if any deletion failed the
    /// result is [`HeicError::PartialFailure`] naming each one. Leftover temp
    /// files and entries with non-UTF-8 names are deleted too. Subdirectories
    /// are never descended into and are reported as failures.
    pub async fn clear_all(&self) -> Result<ClearReport, HeicError> {
        let mut report = ClearReport::default();
        let mut failures = Vec::new();
        let mut attempted = 0;

        for (dir, counter) in [
            (&self.inbox, &mut report.removed_sources),
            (&self.outbox, &mut report.removed_artifacts),
        ] {
            let items = match sweep_dir(dir).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Could not list directory during clear");
                    attempted += 1;
                    failures.push(FileFailure::new(dir.display().to_string(), e.to_string()));
                    continue;
                }
            };

            for item in items {
                attempted += 1;
                if item.is_dir {
                    warn!(path = %item.path.display(), "Not clearing subdirectory");
                    failures.push(FileFailure::new(item.name, "is a directory, not a stored file"));
                    continue;
                }
                match fs::remove_file(&item.path).await {
                    Ok(()) if item.is_temp => debug!(path = %item.path.display(), "Removed leftover temp file"),
                    Ok(()) => *counter += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %item.path.display(), error = %e, "Failed to delete during clear");
                        failures.push(FileFailure::new(item.name, e.to_string()));
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(HeicError::PartialFailure {
                attempted,
                failures,
            });
        }

        info!(
            removed_sources = report.removed_sources,
            removed_artifacts = report.removed_artifacts,
            "Storage cleared"
        );
        Ok(report)
    }
}

/// Any directory entry, as seen by a clear.
struct SweepItem {
    /// Lossy for non-UTF-8 names; `path` stays exact.
    name: String,
    path: PathBuf,
    is_dir: bool,
    is_temp: bool,
}

/// Accept only a single, plain path component.
pub(crate) fn validate_name(name: &str) -> Result<(), HeicError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative directory reference")
    } else if name.contains(['/', '\\', '\0']) {
        Some("name must not contain path separators")
    } else if name.starts_with(TMP_PREFIX) {
        Some("name uses a reserved prefix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(HeicError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

async fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, HeicError> {
    let path = dir.join(name);
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = dir.join(format!("{TMP_PREFIX}{seq}-{name}.tmp"));

    if let Err(e) = fs::write(&tmp_path, bytes).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(HeicError::io("write", &path, e));
    }

    if let Err(e) = fs::rename(&tmp_path, &path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(HeicError::io("rename into", &path, e));
    }

    Ok(path)
}

async fn read_dir(dir: &Path) -> Result<Option<ReadDirStream>, HeicError> {
    match fs::read_dir(dir).await {
        Ok(rd) => Ok(Some(ReadDirStream::new(rd))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HeicError::io("list", dir, e)),
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<StoredEntry>, HeicError> {
    let Some(mut stream) = read_dir(dir).await? else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    while let Some(entry) = stream.next().await {
        let entry = entry.map_err(|e| HeicError::io("list", dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %entry.path().display(), "Skipping entry with non-UTF-8 name");
            continue;
        };
        if name.starts_with(TMP_PREFIX) {
            continue;
        }
        // An entry may vanish between listing and stat (a concurrent clear).
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(HeicError::io("stat", entry.path(), e)),
        };
        if !metadata.is_file() {
            continue;
        }
        entries.push(StoredEntry {
            name,
            path: entry.path(),
            size: metadata.len(),
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Every entry of `dir`, unfiltered.
async fn sweep_dir(dir: &Path) -> Result<Vec<SweepItem>, HeicError> {
    let Some(mut stream) = read_dir(dir).await? else {
        return Ok(Vec::new());
    };

    let mut items = Vec::new();
    while let Some(entry) = stream.next().await {
        let entry = entry.map_err(|e| HeicError::io("list", dir, e))?;
        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(HeicError::io("stat", entry.path(), e)),
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        items.push(SweepItem {
            is_temp: name.starts_with(TMP_PREFIX),
            is_dir: file_type.is_dir(),
            path: entry.path(),
            name,
        });
    }
    Ok(items)
}

async fn exists(dir: &Path, name: &str) -> Result<bool, HeicError> {
    validate_name(name)?;
    let path = dir.join(name);
    fs::try_exists(&path)
        .await
        .map_err(|e| HeicError::io("check", path, e))
}

async fn remove(dir: &Path, name: &str) -> Result<bool, HeicError> {
    validate_name(name)?;
    let path = dir.join(name);
    match fs::remove_file(&path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(HeicError::io("delete", path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn manager(tmp: &TempDir) -> StorageManager {
        StorageManager::new(
            tmp.path().join("uploads"),
            tmp.path().join("converted"),
            "/converted",
        )
    }

    #[tokio::test]
    async fn ensure_directories_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        assert_ok!(storage.ensure_directories().await);
        assert_ok!(storage.ensure_directories().await);
        assert!(storage.inbox_dir().is_dir());
        assert!(storage.outbox_dir().is_dir());
    }

    #[tokio::test]
    async fn latest_upload_wins() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();

        let first = storage.persist_source("photo.heic", &[1u8; 1000]).await.unwrap();
        let second = storage.persist_source("photo.heic", &[2u8; 10]).await.unwrap();
        assert_ne!(first.id, second.id);

        let inbox = storage.list_inbox().await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].size, 10);
        assert_eq!(std::fs::read(&inbox[0].path).unwrap(), vec![2u8; 10]);
    }

    #[tokio::test]
    async fn listing_is_sorted_and_skips_directories() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();
        for name in ["c.heic", "a.heic", "b.heic"] {
            storage.persist_source(name, b"x").await.unwrap();
        }
        std::fs::create_dir(storage.inbox_dir().join("nested")).unwrap();
        std::fs::write(storage.inbox_dir().join(".heic2raster-7-z.heic.tmp"), b"partial").unwrap();

        let names: Vec<String> = storage
            .list_inbox()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.heic", "b.heic", "c.heic"]);
    }

    #[tokio::test]
    async fn listing_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        assert!(storage.list_outbox().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_artifact_sets_locator() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();

        let artifact = storage.write_artifact("photo.png", b"png").await.unwrap();
        assert_eq!(artifact.locator, "/converted/photo.png");
        assert_eq!(artifact.size, 3);
        assert!(storage.outbox_exists("photo.png").await.unwrap());
        assert!(!storage.inbox_exists("photo.png").await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();
        storage.persist_source("a.heic", b"x").await.unwrap();

        assert!(storage.delete_inbox("a.heic").await.unwrap());
        assert!(!storage.delete_inbox("a.heic").await.unwrap());
        assert!(!storage.delete_outbox("never.png").await.unwrap());
    }

    #[tokio::test]
    async fn clear_all_empties_both_directories() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();
        storage.persist_source("a.heic", b"x").await.unwrap();
        storage.persist_source("b.heic", b"y").await.unwrap();
        storage.write_artifact("a.png", b"z").await.unwrap();

        let report = storage.clear_all().await.unwrap();
        assert_eq!(report.removed_sources, 2);
        assert_eq!(report.removed_artifacts, 1);
        assert!(storage.list_inbox().await.unwrap().is_empty());
        assert!(storage.list_outbox().await.unwrap().is_empty());

        let again = storage.clear_all().await.unwrap();
        assert_eq!(again, ClearReport::default());
    }

    #[tokio::test]
    async fn clear_all_removes_temp_files_and_reports_subdirectories() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();
        storage.persist_source("a.heic", b"x").await.unwrap();
        storage.write_artifact("a.png", b"z").await.unwrap();
        std::fs::write(storage.outbox_dir().join(".heic2raster-3-b.png.tmp"), b"partial").unwrap();
        std::fs::create_dir(storage.inbox_dir().join("sub")).unwrap();

        let (attempted, failures) = match storage.clear_all().await {
            Err(HeicError::PartialFailure { attempted, failures }) => (attempted, failures),
            other => panic!("expected a partial failure, got {other:?}"),
        };
        assert_eq!(attempted, 4);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, "sub");

        let left = |dir: &Path| -> Vec<String> {
            std::fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        };
        assert_eq!(left(storage.inbox_dir()), vec!["sub"]);
        assert!(left(storage.outbox_dir()).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn clear_all_removes_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();
        let odd = storage.inbox_dir().join(OsStr::from_bytes(b"img\xff.heic"));
        std::fs::write(&odd, b"x").unwrap();

        let report = storage.clear_all().await.unwrap();
        assert_eq!(report.removed_sources, 1);
        assert!(!odd.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clear_all_keeps_going_past_failed_deletes() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();
        storage.persist_source("a.heic", b"x").await.unwrap();
        storage.write_artifact("a.png", b"z").await.unwrap();
        storage.write_artifact("b.png", b"z").await.unwrap();

        let inbox = storage.inbox_dir().to_path_buf();
        std::fs::set_permissions(&inbox, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users ignore directory permissions.
        if std::fs::write(inbox.join("writable"), b"").is_ok() {
            std::fs::set_permissions(&inbox, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = storage.clear_all().await;
        std::fs::set_permissions(&inbox, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (attempted, failures) = match result {
            Err(HeicError::PartialFailure { attempted, failures }) => (attempted, failures),
            other => panic!("expected a partial failure, got {other:?}"),
        };
        assert_eq!(attempted, 3);
        let names: Vec<&str> = failures.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(names, vec!["a.heic"]);
        assert!(storage.list_outbox().await.unwrap().is_empty());
        assert_eq!(storage.list_inbox().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let tmp = TempDir::new().unwrap();
        let storage = manager(&tmp);
        storage.ensure_directories().await.unwrap();

        assert_err!(storage.persist_source("../escape.heic", b"x").await);
        assert_err!(storage.persist_source("", b"x").await);
        assert_err!(storage.persist_source("..", b"x").await);
        assert_err!(storage.delete_outbox("a/b.png").await);
        assert!(storage.list_inbox().await.unwrap().is_empty());
    }
}
