//! JSON payloads and the HTTP error wrapper.

use crate::config::TargetFormat;
use crate::error::{ErrorKind, FileFailure, HeicError};
use crate::job::{ConversionJob, JobId, JobStatus};
use crate::output::{ArtifactEntry, BatchReport};
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub original_file: String,
    pub converted_file: String,
    pub download_url: String,
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct ConvertAllResponse {
    pub status: &'static str,
    pub format: TargetFormat,
    pub result: BatchReport,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<ArtifactEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_sources: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_artifacts: Option<usize>,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            removed_sources: None,
            removed_artifacts: None,
        }
    }
}

/// Client view of one job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: JobId,
    pub source: String,
    pub format: TargetFormat,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<JobId>,
}

impl From<ConversionJob> for JobView {
    fn from(job: ConversionJob) -> Self {
        let (converted_file, download_url) = match job.artifact {
            Some(a) => (Some(a.name), Some(a.locator)),
            None => (None, None),
        };
        Self {
            id: job.id,
            source: job.source.name,
            format: job.format,
            status: job.status,
            error: job.error,
            converted_file,
            download_url,
            retry_of: job.retry_of,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobView>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub status: &'static str,
    pub job: JobView,
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status: &'static str,
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<FileFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
}

/// An error as returned to HTTP clients.
///
/// Renders as `{status:"error", kind, message}`, plus `failed` for partial
/// failures and `jobId` when a job was created before the error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
    failures: Vec<FileFailure>,
    job_id: Option<JobId>,
}

impl ApiError {
    pub fn with_job_id(mut self, id: JobId) -> Self {
        self.job_id = Some(id);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// An extractor rejection, keeping the status axum chose for it.
    fn rejected(status: StatusCode, message: String) -> Self {
        let kind = if status.is_server_error() {
            ErrorKind::Internal
        } else {
            ErrorKind::Validation
        };
        Self {
            status,
            kind,
            message,
            failures: Vec::new(),
            job_id: None,
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Io
        | ErrorKind::Conversion
        | ErrorKind::PartialFailure
        | ErrorKind::Config
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<HeicError> for ApiError {
    fn from(err: HeicError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let failures = match err {
            HeicError::PartialFailure { failures, .. } => failures,
            _ => Vec::new(),
        };
        Self {
            status: status_for(kind),
            kind,
            message,
            failures,
            job_id: None,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        // Oversized bodies surface here as 413; everything else is a bad request.
        Self::rejected(err.status(), err.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, kind = %self.kind, message = %self.message, "Request failed");
        } else {
            warn!(status = %self.status, kind = %self.kind, message = %self.message, "Request rejected");
        }

        let body = ErrorBody {
            status: "error",
            kind: self.kind,
            message: self.message,
            failed: self.failures,
            job_id: self.job_id,
        };
        (self.status, Json(body)).into_response()
    }
}
