//! Route handlers. Each one is a thin adapter from HTTP onto the
//! orchestrator or the catalog.

use super::response::{
    ApiError, ConvertAllResponse, FilesResponse, JobResponse, JobView, JobsResponse,
    MessageResponse, UploadResponse,
};
use super::AppState;
use crate::config::TargetFormat;
use crate::error::HeicError;
use crate::job::JobId;
use crate::session::SessionView;
use axum::body::Bytes;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use tracing::{debug, info};

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "heicFile";
/// Multipart field carrying the requested target format.
pub const FORMAT_FIELD: &str = "format";

/// `POST /upload`: ingest one file and convert it right away.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut format_token: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some(FILE_FIELD) => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                if !name.is_empty() {
                    file = Some((name, bytes));
                }
            }
            Some(FORMAT_FIELD) => format_token = Some(field.text().await?),
            other => debug!(field = ?other, "Ignoring unknown multipart field"),
        }
    }

    let (name, bytes) = file.ok_or(HeicError::MissingFile)?;
    let orchestrator = &state.orchestrator;
    let format = TargetFormat::parse_or(format_token.as_deref(), orchestrator.config().default_format)?;

    let source = orchestrator.ingest(&name, &bytes).await?;
    let submission = orchestrator.submit(source, format).await;
    let artifact = submission
        .result
        .map_err(|e| ApiError::from(e).with_job_id(submission.job_id))?;

    Ok(Json(UploadResponse {
        status: "success",
        message: "File converted successfully".to_string(),
        original_file: submission.source.name,
        converted_file: artifact.name,
        download_url: artifact.locator,
        job_id: submission.job_id,
    }))
}

/// Batch format from the query string: a single `format=png` selects PNG,
/// anything else (absent, unknown, repeated, unparseable) means JPEG.
fn batch_format(query: Result<Query<Vec<(String, String)>>, QueryRejection>) -> TargetFormat {
    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Unreadable query string, using jpeg");
            return TargetFormat::Jpeg;
        }
    };
    let values: Vec<&str> = pairs
        .iter()
        .filter(|(key, _)| key == FORMAT_FIELD)
        .map(|(_, value)| value.as_str())
        .collect();
    match values.as_slice() {
        [value] => TargetFormat::png_or_jpeg(Some(value)),
        _ => TargetFormat::Jpeg,
    }
}

/// `GET /convert-all?format=`: convert the whole inbox.
pub async fn convert_all(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ConvertAllResponse>, ApiError> {
    let format = batch_format(query);
    let result = state.orchestrator.convert_all(format).await?;
    Ok(Json(ConvertAllResponse {
        status: "success",
        format,
        result,
    }))
}

/// `GET /converted-files`
pub async fn converted_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, ApiError> {
    let files = state.catalog.list_artifacts().await?;
    Ok(Json(FilesResponse { files }))
}

/// `DELETE /clear`: wipe both directories and forget every job.
pub async fn clear(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    let result = state.catalog.clear().await;
    // Even a partial clear has deleted files some jobs point at.
    state.orchestrator.forget_jobs();
    let report = result?;
    info!(
        removed_sources = report.removed_sources,
        removed_artifacts = report.removed_artifacts,
        "Cleared all files"
    );
    Ok(Json(MessageResponse::success("All files cleared")))
}

/// `GET /jobs`
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    let jobs = state
        .orchestrator
        .jobs()
        .into_iter()
        .map(JobView::from)
        .collect();
    Json(JobsResponse { jobs })
}

/// `GET /jobs/{id}`
pub async fn get_job(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<JobView>, ApiError> {
    let Path(id) = path?;
    let job = state
        .orchestrator
        .job(JobId(id))
        .ok_or(HeicError::JobNotFound { id })?;
    Ok(Json(job.into()))
}

/// `POST /jobs/{id}/retry`: re-run a failed job from its stored source.
pub async fn retry_job(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Path(id) = path?;
    let orchestrator = &state.orchestrator;
    let submission = orchestrator.retry(JobId(id)).await?;
    let job_id = submission.job_id;
    submission
        .result
        .map_err(|e| ApiError::from(e).with_job_id(job_id))?;

    let job = orchestrator
        .job(job_id)
        .ok_or(HeicError::JobNotFound { id: job_id.0 })?;
    Ok(Json(JobResponse {
        status: "success",
        job: job.into(),
    }))
}

/// `DELETE /jobs/{id}`: remove a job's source and artifact.
pub async fn remove_job(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path?;
    let report = state.orchestrator.remove(JobId(id)).await?;
    Ok(Json(MessageResponse {
        removed_sources: Some(report.removed_sources),
        removed_artifacts: Some(report.removed_artifacts),
        ..MessageResponse::success(format!("Job {id} removed"))
    }))
}

/// `GET /session`: catalog and job table, reconciled.
pub async fn session(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let artifacts = state.catalog.list_artifacts().await?;
    let jobs = state.orchestrator.jobs();
    Ok(Json(SessionView::reconcile(&artifacts, &jobs)))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "converter": state.orchestrator.converter().name(),
        "jobs": state.orchestrator.jobs().len(),
    }))
}
