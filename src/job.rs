//! Conversion jobs and the table that tracks them.
//!
//! ```text
//! pending ──▶ converting ──▶ converted
//!                  │
//!                  └──────▶ failed ──retry──▶ (new job) pending
//! ```
//!
//! Transitions only move forward. A retry never rewinds a failed job; it
//! creates a fresh job that points back at the failed one via `retry_of`.

use crate::config::TargetFormat;
use crate::error::HeicError;
use crate::output::{Artifact, SourceFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifier of a conversion job, monotonic within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Converting,
    Converted,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Converted | JobStatus::Failed)
    }

    fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Converting)
                | (JobStatus::Converting, JobStatus::Converted)
                | (JobStatus::Converting, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Converting => "converting",
            JobStatus::Converted => "converted",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One conversion attempt for one source file.
///
/// `error` is set iff the job failed; `artifact` is set iff it converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: SourceFile,
    pub format: TargetFormat,
    pub status: JobStatus,
    pub error: Option<String>,
    pub artifact: Option<Artifact>,
    /// The failed job this one retries, if any.
    pub retry_of: Option<JobId>,
}

impl ConversionJob {
    fn new(id: JobId, source: SourceFile, format: TargetFormat, retry_of: Option<JobId>) -> Self {
        Self {
            id,
            source,
            format,
            status: JobStatus::Pending,
            error: None,
            artifact: None,
            retry_of,
        }
    }

    fn advance(&mut self, next: JobStatus) -> Result<(), HeicError> {
        if !self.status.can_advance_to(next) {
            return Err(HeicError::Internal(format!(
                "job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub(crate) fn start(&mut self) -> Result<(), HeicError> {
        self.advance(JobStatus::Converting)
    }

    pub(crate) fn complete(&mut self, artifact: Artifact) -> Result<(), HeicError> {
        self.advance(JobStatus::Converted)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) -> Result<(), HeicError> {
        self.advance(JobStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }
}

/// In-memory registry of jobs, ordered by id.
#[derive(Debug, Default)]
pub struct JobTable {
    inner: Mutex<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    next_id: u64,
    jobs: BTreeMap<JobId, ConversionJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new pending job and return its id.
    pub(crate) fn create(
        &self,
        source: SourceFile,
        format: TargetFormat,
        retry_of: Option<JobId>,
    ) -> JobId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = JobId(inner.next_id);
        inner
            .jobs
            .insert(id, ConversionJob::new(id, source, format, retry_of));
        id
    }

    /// Apply a state transition to a tracked job.
    ///
    /// A job removed concurrently (by a clear or an explicit removal) is
    /// silently skipped: the conversion itself still finishes.
    ///
    /// When the job reaches a terminal state it supersedes every older
    /// terminal job for the same source and format, since its artifact
    /// overwrote theirs. Those are dropped, except the failed job this one
    /// retries.
    pub(crate) fn update<F>(&self, id: JobId, f: F) -> Result<(), HeicError>
    where
        F: FnOnce(&mut ConversionJob) -> Result<(), HeicError>,
    {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(());
        };
        f(job)?;
        if job.status.is_terminal() {
            let (source, format, retry_of) = (job.source.name.clone(), job.format, job.retry_of);
            inner.jobs.retain(|other_id, other| {
                *other_id >= id
                    || Some(*other_id) == retry_of
                    || !other.status.is_terminal()
                    || other.format != format
                    || other.source.name != source
            });
        }
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<ConversionJob> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Snapshot of every job, ordered by id.
    pub fn snapshot(&self) -> Vec<ConversionJob> {
        self.lock().jobs.values().cloned().collect()
    }

    /// Forget every job whose source has this inbox name; returns them.
    pub(crate) fn remove_source(&self, source_name: &str) -> Vec<ConversionJob> {
        let mut inner = self.lock();
        let ids: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|j| j.source.name == source_name)
            .map(|j| j.id)
            .collect();
        ids.iter().filter_map(|id| inner.jobs.remove(id)).collect()
    }

    /// Forget every job. Ids keep increasing afterwards.
    pub(crate) fn clear(&self) {
        self.lock().jobs.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
