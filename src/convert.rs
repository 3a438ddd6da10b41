//! Conversion orchestrator: the job state machine over storage and adapter.
//!
//! ## Why eager vs. streaming?
//!
//! [`Orchestrator::convert_all`] waits for every inbox entry and returns one
//! aggregate [`BatchReport`]. Use [`crate::stream::convert_stream`] instead
//! when outcomes should be shown as they complete.
//!
//! Per-file failures inside a batch never abort it: each entry runs
//! independently and its failure becomes a [`FileFailure`] in the report.

use crate::config::{ServiceConfig, TargetFormat};
use crate::error::{FileFailure, HeicError};
use crate::job::{ConversionJob, JobId, JobStatus, JobTable};
use crate::output::{Artifact, BatchReport, ClearReport, SourceFile, StoredEntry};
use crate::pipeline::adapter::{CommandConverter, Converter};
use crate::pipeline::naming;
use crate::storage::StorageManager;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of submitting one source for conversion.
#[derive(Debug)]
pub struct Submission {
    pub job_id: JobId,
    pub source: SourceFile,
    pub result: Result<Artifact, HeicError>,
}

/// Outcome of one entry of a batch.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source: String,
    /// None when the entry was rejected before a job was created.
    pub job_id: Option<JobId>,
    pub result: Result<Artifact, FileFailure>,
}

/// Owns job state and drives conversions through the adapter into storage.
pub struct Orchestrator {
    config: ServiceConfig,
    storage: StorageManager,
    converter: Arc<dyn Converter>,
    jobs: JobTable,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("storage", &self.storage)
            .field("converter", &self.converter.name())
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

impl Orchestrator {
    /// Build an orchestrator from `config`.
    ///
    /// Uses `config.converter` when set, otherwise a [`CommandConverter`]
    /// running the default external decoder at `config.jpeg_quality`.
    pub fn new(config: ServiceConfig) -> Self {
        let converter = resolve_converter(&config);
        let storage = StorageManager::from_config(&config);
        Self {
            config,
            storage,
            converter,
            jobs: JobTable::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    /// Snapshot of every tracked job, ordered by id.
    pub fn jobs(&self) -> Vec<ConversionJob> {
        self.jobs.snapshot()
    }

    pub fn job(&self, id: JobId) -> Option<ConversionJob> {
        self.jobs.get(id)
    }

    /// Validate and persist an upload into the inbox.
    ///
    /// The extension check happens before any filesystem access, so a
    /// rejected upload leaves neither an inbox entry nor a job behind.
    /// Client-supplied names are reduced to their final path component.
    pub async fn ingest(&self, original_name: &str, bytes: &[u8]) -> Result<SourceFile, HeicError> {
        let name = base_name(original_name);
        if !self.config.accepts_source(name) {
            return Err(HeicError::UnsupportedSource {
                name: name.to_string(),
                accepted: self.config.accepted_extensions(),
            });
        }
        self.storage.persist_source(name, bytes).await
    }

    /// Convert `source` to `format` under a new job and return the outcome
    /// together with the job id.
    pub async fn submit(&self, source: SourceFile, format: TargetFormat) -> Submission {
        let (job_id, result) = self.run_job(&source, format, None).await;
        Submission {
            job_id,
            source,
            result,
        }
    }

    /// Convert one source file.
    ///
    /// `format` is already a member of the supported enumeration; string
    /// input is validated when it is parsed into a [`TargetFormat`], before
    /// this is ever reached. On adapter failure the returned
    /// [`HeicError::Conversion`] carries the adapter's message verbatim.
    pub async fn convert_one(
        &self,
        source: &SourceFile,
        format: TargetFormat,
    ) -> Result<Artifact, HeicError> {
        self.run_job(source, format, None).await.1
    }

    /// Convert every entry currently in the inbox.
    ///
    /// Entries run concurrently, at most `config.concurrency` at a time. The
    /// report accounts for each entry exactly once; only a failure to list
    /// the inbox itself is returned as `Err`.
    pub async fn convert_all(&self, format: TargetFormat) -> Result<BatchReport, HeicError> {
        let start = Instant::now();
        let entries = self.storage.list_inbox().await?;
        let total = entries.len();
        info!(total, format = %format, concurrency = self.config.concurrency, "Starting batch conversion");

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let outcomes: Vec<FileOutcome> = stream::iter(
            entries
                .into_iter()
                .map(|entry| self.convert_entry(entry, format)),
        )
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await;

        let report = build_report(outcomes);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, report.succeeded);
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch conversion complete"
        );
        Ok(report)
    }

    /// Re-run a failed job from the source bytes already in the inbox.
    ///
    /// The failed job is left as it is; the retry runs under a new job whose
    /// `retry_of` points back at it.
    pub async fn retry(&self, id: JobId) -> Result<Submission, HeicError> {
        let job = self.jobs.get(id).ok_or(HeicError::JobNotFound { id: id.0 })?;
        if job.status != JobStatus::Failed {
            return Err(HeicError::RetryNotAllowed {
                id: id.0,
                status: job.status.to_string(),
            });
        }
        if !self.storage.inbox_exists(&job.source.name).await? {
            return Err(HeicError::SourceGone {
                name: job.source.name,
            });
        }

        info!(job_id = %id, source = %job.source.name, "Retrying failed job");
        let (job_id, result) = self.run_job(&job.source, job.format, Some(id)).await;
        Ok(Submission {
            job_id,
            source: job.source,
            result,
        })
    }

    /// Remove a job's source and every artifact produced for that source,
    /// and forget all jobs that referenced it.
    ///
    /// Jobs are only forgotten once every file is gone; if a deletion fails
    /// they stay tracked so the removal can be repeated.
    pub async fn remove(&self, id: JobId) -> Result<ClearReport, HeicError> {
        let job = self.jobs.get(id).ok_or(HeicError::JobNotFound { id: id.0 })?;
        let source_name = job.source.name;

        let mut artifact_names: Vec<String> = self
            .jobs
            .snapshot()
            .into_iter()
            .filter(|j| j.source.name == source_name)
            .filter_map(|j| j.artifact.map(|a| a.name))
            .collect();
        artifact_names.sort_unstable();
        artifact_names.dedup();

        let mut report = ClearReport::default();
        for name in &artifact_names {
            if self.storage.delete_outbox(name).await? {
                report.removed_artifacts += 1;
            }
        }
        if self.storage.delete_inbox(&source_name).await? {
            report.removed_sources += 1;
        }

        let removed_jobs = self.jobs.remove_source(&source_name);
        info!(job_id = %id, source = %source_name, jobs = removed_jobs.len(), "Removed job");
        Ok(report)
    }

    /// Forget every tracked job. Used after a bulk clear.
    pub fn forget_jobs(&self) {
        self.jobs.clear();
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Convert one inbox entry of a batch, reporting progress.
    pub(crate) async fn convert_entry(&self, entry: StoredEntry, format: TargetFormat) -> FileOutcome {
        let name = entry.name.clone();
        let cb = self.config.progress_callback.as_ref();

        if !self.config.accepts_source(&name) {
            let reason = format!("Not a {} source file", self.config.accepted_extensions());
            warn!(source = %name, "Skipping inbox entry with unsupported extension");
            if let Some(cb) = cb {
                cb.on_file_error(&name, &reason);
            }
            return FileOutcome {
                source: name.clone(),
                job_id: None,
                result: Err(FileFailure::new(name, reason)),
            };
        }

        if let Some(cb) = cb {
            cb.on_file_start(&name);
        }
        let source = SourceFile::from_entry(entry);
        let (job_id, result) = self.run_job(&source, format, None).await;

        let result = match result {
            Ok(artifact) => {
                if let Some(cb) = cb {
                    cb.on_file_complete(&name, &artifact.name, artifact.size);
                }
                Ok(artifact)
            }
            Err(e) => {
                let reason = e.to_string();
                if let Some(cb) = cb {
                    cb.on_file_error(&name, &reason);
                }
                Err(FileFailure::new(name.clone(), reason))
            }
        };

        FileOutcome {
            source: name,
            job_id: Some(job_id),
            result,
        }
    }

    /// Create a job for `source` and drive it to a terminal state.
    async fn run_job(
        &self,
        source: &SourceFile,
        format: TargetFormat,
        retry_of: Option<JobId>,
    ) -> (JobId, Result<Artifact, HeicError>) {
        let id = self.jobs.create(source.clone(), format, retry_of);
        let result = self.execute(id, source, format).await;
        (id, result)
    }

    async fn execute(
        &self,
        id: JobId,
        source: &SourceFile,
        format: TargetFormat,
    ) -> Result<Artifact, HeicError> {
        let start = Instant::now();
        self.jobs.update(id, |j| j.start())?;

        let output_name = naming::output_name(&source.name, format, &self.config.source_extensions);
        debug!(job_id = %id, source = %source.name, output = %output_name, "Converting");

        let bytes = match self.converter.convert(&source.path, format).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(job_id = %id, source = %source.name, error = %e, "Conversion failed");
                self.jobs.update(id, |j| j.fail(e.message.clone()))?;
                return Err(HeicError::Conversion {
                    source_name: source.name.clone(),
                    message: e.message,
                });
            }
        };

        match self.storage.write_artifact(&output_name, &bytes).await {
            Ok(artifact) => {
                self.jobs.update(id, |j| j.complete(artifact.clone()))?;
                info!(
                    job_id = %id,
                    source = %source.name,
                    output = %artifact.name,
                    size_bytes = artifact.size,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Converted"
                );
                Ok(artifact)
            }
            Err(e) => {
                warn!(job_id = %id, source = %source.name, error = %e, "Storing artifact failed");
                self.jobs.update(id, |j| j.fail(e.to_string()))?;
                Err(e)
            }
        }
    }
}

/// Pick the adapter: a pre-built one from the config, else the external decoder.
fn resolve_converter(config: &ServiceConfig) -> Arc<dyn Converter> {
    match config.converter {
        Some(ref converter) => Arc::clone(converter),
        None => Arc::new(CommandConverter::default().with_jpeg_quality(config.jpeg_quality)),
    }
}

/// Final path component of a client-supplied file name.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

/// Fold batch outcomes into a report ordered by source name.
pub(crate) fn build_report(outcomes: Vec<FileOutcome>) -> BatchReport {
    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome.result {
            Ok(artifact) => {
                report.succeeded += 1;
                report.artifacts.push(artifact);
            }
            Err(failure) => report.failed.push(failure),
        }
    }
    report.failed.sort_by(|a, b| a.source.cmp(&b.source));
    report.artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::adapter::ConverterError;
    use crate::progress::BatchProgressCallback;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Returns the file name as bytes, or fails for names containing "bad".
    struct EchoConverter;

    #[async_trait]
    impl Converter for EchoConverter {
        fn name(&self) -> &str {
            "echo"
        }

        async fn convert(&self, source: &Path, format: TargetFormat) -> Result<Vec<u8>, ConverterError> {
            let name = source.file_name().unwrap().to_string_lossy().to_string();
            if name.contains("bad") {
                return Err(ConverterError::new(format!("cannot decode {name}")));
            }
            Ok(format!("{name}->{format}").into_bytes())
        }
    }

    fn orchestrator(tmp: &TempDir) -> Orchestrator {
        let config = ServiceConfig::builder()
            .inbox_dir(tmp.path().join("uploads"))
            .outbox_dir(tmp.path().join("converted"))
            .converter(Arc::new(EchoConverter))
            .build()
            .unwrap();
        Orchestrator::new(config)
    }

    #[test]
    fn base_name_strips_client_paths() {
        assert_eq!(base_name("C:\\Users\\me\\IMG.heic"), "IMG.heic");
        assert_eq!(base_name("dir/sub/a.heic"), "a.heic");
        assert_eq!(base_name("plain.heic"), "plain.heic");
    }

    #[tokio::test]
    async fn ingest_rejects_foreign_extension_without_io() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);

        let err = orch.ingest("cat.gif", b"GIF89a").await.unwrap_err();
        assert!(matches!(err, HeicError::UnsupportedSource { .. }));
        assert!(!tmp.path().join("uploads").exists());
        assert!(orch.jobs().is_empty());
    }

    #[tokio::test]
    async fn convert_one_tracks_job_to_converted() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let source = orch.ingest("photo.heic", &[0u8; 1000]).await.unwrap();
        let artifact = orch.convert_one(&source, TargetFormat::Png).await.unwrap();
        assert_eq!(artifact.name, "photo.png");
        assert_eq!(artifact.locator, "/converted/photo.png");
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"photo.heic->png");

        let jobs = orch.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Converted);
    }

    #[tokio::test]
    async fn adapter_message_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let source = orch.ingest("bad.heic", b"x").await.unwrap();
        let sub = orch.submit(source, TargetFormat::Jpeg).await;
        let err = sub.result.unwrap_err();
        assert_eq!(err.to_string(), "cannot decode bad.heic");

        let job = orch.job(sub.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("cannot decode bad.heic"));
        assert!(orch.storage().list_outbox().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry_only_for_failed_jobs() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let ok = orch.ingest("fine.heic", b"x").await.unwrap();
        let sub = orch.submit(ok, TargetFormat::Jpeg).await;
        let err = orch.retry(sub.job_id).await.unwrap_err();
        assert!(matches!(err, HeicError::RetryNotAllowed { .. }));

        let err = orch.retry(JobId(404)).await.unwrap_err();
        assert!(matches!(err, HeicError::JobNotFound { id: 404 }));
    }

    #[tokio::test]
    async fn retry_creates_new_job_and_keeps_failed_one() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let source = orch.ingest("bad.heic", b"x").await.unwrap();
        let first = orch.submit(source, TargetFormat::Png).await;
        let retried = orch.retry(first.job_id).await.unwrap();

        assert_ne!(retried.job_id, first.job_id);
        let new_job = orch.job(retried.job_id).unwrap();
        assert_eq!(new_job.retry_of, Some(first.job_id));
        assert_eq!(new_job.source.name, "bad.heic");
        assert_eq!(orch.job(first.job_id).unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn retry_after_source_removed_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let source = orch.ingest("bad.heic", b"x").await.unwrap();
        let first = orch.submit(source, TargetFormat::Png).await;
        orch.storage().delete_inbox("bad.heic").await.unwrap();

        let err = orch.retry(first.job_id).await.unwrap_err();
        assert!(matches!(err, HeicError::SourceGone { .. }));
    }

    #[tokio::test]
    async fn convert_all_counts_every_entry() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();
        for name in ["a.heic", "bad1.heic", "c.heic", "bad2.heic"] {
            orch.ingest(name, b"x").await.unwrap();
        }
        // Dropped in by hand, not through an upload.
        std::fs::write(tmp.path().join("uploads/notes.txt"), b"hello").unwrap();

        let report = orch.convert_all(TargetFormat::Png).await.unwrap();
        assert_eq!(report.total(), 5);
        assert_eq!(report.succeeded, 2);
        let failed: Vec<&str> = report.failed.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(failed, vec!["bad1.heic", "bad2.heic", "notes.txt"]);

        let outbox: Vec<String> = orch
            .storage()
            .list_outbox()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(outbox, vec!["a.png", "c.png"]);
    }

    #[tokio::test]
    async fn convert_all_on_empty_inbox() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        let report = orch.convert_all(TargetFormat::Jpeg).await.unwrap();
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn remove_deletes_source_and_artifact() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let source = orch.ingest("a.heic", b"x").await.unwrap();
        let sub = orch.submit(source, TargetFormat::Png).await;
        let report = orch.remove(sub.job_id).await.unwrap();

        assert_eq!(report.removed_sources, 1);
        assert_eq!(report.removed_artifacts, 1);
        assert!(orch.jobs().is_empty());
        assert!(orch.storage().list_outbox().await.unwrap().is_empty());
        assert!(matches!(
            orch.remove(sub.job_id).await.unwrap_err(),
            HeicError::JobNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn failed_remove_keeps_jobs_tracked() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();

        let source = orch.ingest("a.heic", b"x").await.unwrap();
        let sub = orch.submit(source, TargetFormat::Png).await;
        // A directory where the artifact was cannot be removed as a file.
        let artifact = tmp.path().join("converted/a.png");
        std::fs::remove_file(&artifact).unwrap();
        std::fs::create_dir(&artifact).unwrap();

        let err = orch.remove(sub.job_id).await.unwrap_err();
        assert!(matches!(err, HeicError::Io { .. }), "{err:?}");
        assert!(orch.job(sub.job_id).is_some());
        assert!(orch.storage().inbox_exists("a.heic").await.unwrap());
    }

    #[tokio::test]
    async fn repeated_batches_keep_one_job_per_source() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.storage().ensure_directories().await.unwrap();
        for i in 0..10 {
            orch.ingest(&format!("img{i}.heic"), b"x").await.unwrap();
        }

        for _ in 0..5 {
            orch.convert_all(TargetFormat::Png).await.unwrap();
        }
        assert_eq!(orch.jobs().len(), 10);

        orch.convert_all(TargetFormat::Jpeg).await.unwrap();
        assert_eq!(orch.jobs().len(), 20);
        assert_eq!(orch.storage().list_outbox().await.unwrap().len(), 20);
    }

    /// Sleeps per file and records the most conversions seen at once.
    #[derive(Default)]
    struct PeakConverter {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Converter for PeakConverter {
        fn name(&self) -> &str {
            "peak"
        }

        async fn convert(&self, _source: &Path, _format: TargetFormat) -> Result<Vec<u8>, ConverterError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![0])
        }
    }

    #[tokio::test]
    async fn convert_all_bounds_concurrency() {
        let tmp = TempDir::new().unwrap();
        let converter = Arc::new(PeakConverter::default());
        let config = ServiceConfig::builder()
            .inbox_dir(tmp.path().join("uploads"))
            .outbox_dir(tmp.path().join("converted"))
            .concurrency(3)
            .converter(converter.clone())
            .build()
            .unwrap();
        let orch = Orchestrator::new(config);
        orch.storage().ensure_directories().await.unwrap();
        for i in 0..12 {
            orch.ingest(&format!("img{i}.heic"), b"x").await.unwrap();
        }

        let report = orch.convert_all(TargetFormat::Jpeg).await.unwrap();
        assert_eq!(report.succeeded, 12);
        let peak = converter.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeds 3");
        assert!(peak >= 2, "batch ran sequentially");
    }

    #[derive(Default)]
    struct TrackingCallback {
        batch_starts: Mutex<Vec<usize>>,
        file_starts: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<String>>,
        batch_completes: Mutex<Vec<(usize, usize)>>,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_files: usize) {
            self.batch_starts.lock().unwrap().push(total_files);
        }

        fn on_file_start(&self, _source: &str) {
            self.file_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _source: &str, _output: &str, _bytes: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, source: &str, _error: &str) {
            self.errors.lock().unwrap().push(source.to_string());
        }

        fn on_batch_complete(&self, total_files: usize, success_count: usize) {
            self.batch_completes.lock().unwrap().push((total_files, success_count));
        }
    }

    #[tokio::test]
    async fn convert_all_fires_progress_events() {
        let tmp = TempDir::new().unwrap();
        let tracker = Arc::new(TrackingCallback::default());
        let config = ServiceConfig::builder()
            .inbox_dir(tmp.path().join("uploads"))
            .outbox_dir(tmp.path().join("converted"))
            .converter(Arc::new(EchoConverter))
            .progress_callback(tracker.clone())
            .build()
            .unwrap();
        let orch = Orchestrator::new(config);
        orch.storage().ensure_directories().await.unwrap();
        for name in ["a.heic", "b.heic", "bad.heic"] {
            orch.ingest(name, b"x").await.unwrap();
        }
        std::fs::write(tmp.path().join("uploads/notes.txt"), b"hello").unwrap();

        orch.convert_all(TargetFormat::Png).await.unwrap();

        assert_eq!(*tracker.batch_starts.lock().unwrap(), vec![4]);
        // The non-source entry never reaches the adapter.
        assert_eq!(tracker.file_starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        let mut errors = tracker.errors.lock().unwrap().clone();
        errors.sort();
        assert_eq!(errors, vec!["bad.heic", "notes.txt"]);
        assert_eq!(*tracker.batch_completes.lock().unwrap(), vec![(4, 2)]);
    }
}
