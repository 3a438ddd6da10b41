//! Artifact catalog: the outbox, viewed as a list of downloads.
//!
//! The catalog keeps no state of its own. Every call re-reads the outbox, so
//! artifacts written by an earlier process are listed after a restart.

use crate::error::HeicError;
use crate::output::{ArtifactEntry, ClearReport};
use crate::storage::StorageManager;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ArtifactCatalog {
    storage: StorageManager,
}

impl ArtifactCatalog {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }

    /// Every artifact currently in the outbox, in listing order.
    pub async fn list_artifacts(&self) -> Result<Vec<ArtifactEntry>, HeicError> {
        let entries = self.storage.list_outbox().await?;
        Ok(entries
            .into_iter()
            .map(|e| ArtifactEntry {
                download_url: self.storage.locator(&e.name),
                name: e.name,
            })
            .collect())
    }

    /// Delete every source and artifact.
    ///
    /// Succeeds on an already empty state. Job bookkeeping is not touched
    /// here; the service facade forgets jobs alongside.
    pub async fn clear(&self) -> Result<ClearReport, HeicError> {
        let report = self.storage.clear_all().await?;
        info!(
            removed_sources = report.removed_sources,
            removed_artifacts = report.removed_artifacts,
            "Catalog cleared"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_outbox_with_locators() {
        let tmp = TempDir::new().unwrap();
        let storage = StorageManager::new(tmp.path().join("in"), tmp.path().join("out"), "/converted");
        storage.ensure_directories().await.unwrap();
        storage.write_artifact("b.png", b"b").await.unwrap();
        storage.write_artifact("a.jpeg", b"a").await.unwrap();

        let catalog = ArtifactCatalog::new(storage);
        let files = catalog.list_artifacts().await.unwrap();
        assert_eq!(
            files,
            vec![
                ArtifactEntry {
                    name: "a.jpeg".into(),
                    download_url: "/converted/a.jpeg".into()
                },
                ArtifactEntry {
                    name: "b.png".into(),
                    download_url: "/converted/b.png".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn survives_restart() {
        let tmp = TempDir::new().unwrap();
        let storage = StorageManager::new(tmp.path().join("in"), tmp.path().join("out"), "/converted");
        storage.ensure_directories().await.unwrap();
        storage.write_artifact("old.png", b"x").await.unwrap();
        drop(storage);

        let fresh = StorageManager::new(tmp.path().join("in"), tmp.path().join("out"), "/converted");
        let files = ArtifactCatalog::new(fresh).list_artifacts().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "old.png");
    }

    #[tokio::test]
    async fn clear_then_list_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = StorageManager::new(tmp.path().join("in"), tmp.path().join("out"), "/converted");
        storage.ensure_directories().await.unwrap();
        storage.persist_source("a.heic", b"x").await.unwrap();
        storage.write_artifact("a.png", b"y").await.unwrap();

        let catalog = ArtifactCatalog::new(storage);
        catalog.clear().await.unwrap();
        assert!(catalog.list_artifacts().await.unwrap().is_empty());
        assert_eq!(catalog.clear().await.unwrap(), ClearReport::default());
    }
}
