//! Client-facing session view, derived on demand.
//!
//! Nothing here is stored. [`SessionView::reconcile`] rebuilds the view from
//! the two sources of truth: the artifact catalog (what exists on disk) and
//! the job table (what this process has attempted). Rebuilding after every
//! request means a clear, a restart or an external delete can never leave the
//! view pointing at files that are gone.

use crate::config::TargetFormat;
use crate::job::{ConversionJob, JobId, JobStatus};
use crate::output::ArtifactEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Raster extension of an artifact with no known job.
static RE_RASTER_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(jpe?g|png)$").unwrap());

/// One row of the session view, keyed by source file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub source: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TargetFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Ordered by source name.
    pub entries: Vec<SessionEntry>,
    pub converted: usize,
    pub failed: usize,
    pub in_progress: usize,
}

impl SessionView {
    /// Merge the catalog with the latest job per source.
    ///
    /// * every catalog artifact shows up as `converted`;
    /// * a source's most recent job overrides whatever the catalog implies;
    /// * a converted job whose artifact is no longer in the catalog is
    ///   dropped, since its file is gone;
    /// * artifacts no job claims get a source name guessed by swapping the
    ///   raster extension for `.heic`.
    pub fn reconcile(artifacts: &[ArtifactEntry], jobs: &[ConversionJob]) -> Self {
        let mut latest: HashMap<&str, &ConversionJob> = HashMap::new();
        for job in jobs {
            let slot = latest.entry(job.source.name.as_str()).or_insert(job);
            if job.id > slot.id {
                *slot = job;
            }
        }

        let catalog: HashMap<&str, &ArtifactEntry> =
            artifacts.iter().map(|a| (a.name.as_str(), a)).collect();
        let claimed: HashSet<&str> = latest
            .values()
            .filter(|j| j.status == JobStatus::Converted)
            .filter_map(|j| j.artifact.as_ref().map(|a| a.name.as_str()))
            .collect();

        let mut rows: BTreeMap<String, SessionEntry> = BTreeMap::new();

        for artifact in artifacts.iter().filter(|a| !claimed.contains(a.name.as_str())) {
            let source = guess_source(&artifact.name);
            rows.insert(
                source.clone(),
                SessionEntry {
                    source,
                    status: JobStatus::Converted,
                    converted_file: Some(artifact.name.clone()),
                    download_url: Some(artifact.download_url.clone()),
                    error: None,
                    job_id: None,
                    format: format_of(&artifact.name),
                },
            );
        }

        for job in latest.values() {
            let mut row = SessionEntry {
                source: job.source.name.clone(),
                status: job.status,
                converted_file: None,
                download_url: None,
                error: job.error.clone(),
                job_id: Some(job.id),
                format: Some(job.format),
            };

            if job.status == JobStatus::Converted {
                let on_disk = job
                    .artifact
                    .as_ref()
                    .and_then(|a| catalog.get(a.name.as_str()));
                let Some(entry) = on_disk else {
                    continue;
                };
                row.converted_file = Some(entry.name.clone());
                row.download_url = Some(entry.download_url.clone());
            }

            rows.insert(row.source.clone(), row);
        }

        let mut view = SessionView {
            entries: rows.into_values().collect(),
            ..Default::default()
        };
        for entry in &view.entries {
            match entry.status {
                JobStatus::Converted => view.converted += 1,
                JobStatus::Failed => view.failed += 1,
                JobStatus::Pending | JobStatus::Converting => view.in_progress += 1,
            }
        }
        view
    }
}

fn guess_source(artifact_name: &str) -> String {
    if RE_RASTER_EXT.is_match(artifact_name) {
        RE_RASTER_EXT.replace(artifact_name, ".heic").into_owned()
    } else {
        format!("{artifact_name}.heic")
    }
}

fn format_of(artifact_name: &str) -> Option<TargetFormat> {
    Path::new(artifact_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse().ok())
}
