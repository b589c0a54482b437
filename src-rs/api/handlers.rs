use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::JobError;
use crate::job::{Job, JobKind};
use crate::tracker::JobTracker;
use crate::update_check::{check_for_updates, update_status, UpdateCheck, UpdateStatus};

pub type SharedTracker = Arc<JobTracker>;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Unreadable request bodies are bad requests, with axum's reason as
    /// the message.
    pub fn from_rejection(rejection: &JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let status = match err {
            JobError::SpecInvalid(_) => StatusCode::BAD_REQUEST,
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("request failed: {err}");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub server_type: Option<String>,
    pub mc_version: Option<String>,
    pub build_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProgressQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct JobsQuery {
    pub limit: Option<usize>,
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_start_download(
    State(tracker): State<SharedTracker>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::from_rejection(&rejection))?;
    let id = tracker.submit_download(
        req.server_type.as_deref().unwrap_or_default(),
        req.mc_version.as_deref().unwrap_or_default(),
        req.build_version.as_deref().unwrap_or_default(),
    )?;
    Ok(Json(json!({
        "downloadId": id,
        "message": "Download started",
        "status": "downloading",
    })))
}

pub async fn handle_list_downloads(State(tracker): State<SharedTracker>) -> Json<Value> {
    let downloads = tracker.list(MAX_LIST_LIMIT, Some(JobKind::Download));
    Json(json!({"downloads": downloads}))
}

pub async fn handle_download_status(
    State(tracker): State<SharedTracker>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    find_kind(&tracker, &id, JobKind::Download, "Download not found").map(Json)
}

pub async fn handle_start_update(
    State(tracker): State<SharedTracker>,
) -> Result<Json<Value>, ApiError> {
    let id = tracker.submit_update()?;
    Ok(Json(json!({
        "updateId": id,
        "message": "Update started",
    })))
}

pub async fn handle_update_progress(
    State(tracker): State<SharedTracker>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<Job>, ApiError> {
    let id = match query.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(ApiError::new(StatusCode::BAD_REQUEST, "Update ID is required")),
    };
    find_kind(&tracker, &id, JobKind::Update, "Update not found").map(Json)
}

pub async fn handle_update_status(State(tracker): State<SharedTracker>) -> Json<UpdateStatus> {
    Json(update_status(tracker.config()).await)
}

pub async fn handle_update_check(
    State(tracker): State<SharedTracker>,
) -> Result<Json<UpdateCheck>, ApiError> {
    let runner = tracker.operations().runner.clone();
    let check = check_for_updates(tracker.config(), runner.as_ref())
        .await
        .map_err(|err| {
            error!("update check failed: {err}");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to check for updates")
        })?;
    Ok(Json(check))
}

pub async fn handle_list_jobs(
    State(tracker): State<SharedTracker>,
    Query(query): Query<JobsQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    Json(json!({"jobs": tracker.list(limit, None)}))
}

pub async fn handle_cancel_job(
    State(tracker): State<SharedTracker>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(tracker.cancel(&id)?))
}

fn find_kind(tracker: &JobTracker, id: &str, kind: JobKind, missing: &str) -> Result<Job, ApiError> {
    match tracker.get_status(id) {
        Ok(job) if job.kind == kind => Ok(job),
        Ok(_) | Err(JobError::NotFound(_)) => Err(ApiError::new(StatusCode::NOT_FOUND, missing)),
        Err(err) => Err(err.into()),
    }
}
