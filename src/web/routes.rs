use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::pages;
use super::AppState;
use crate::export::ExportFormat;
use crate::jobs::{DownloadError, SubmitError};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/process", post(start_processing))
        .route("/status/:id", get(job_status))
        .route("/queue", get(queue_info))
        .route("/download/:id", get(download))
        .route("/healthz", get(health))
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    url: String,
    #[serde(default = "default_formats")]
    formats: Vec<String>,
    #[serde(default = "default_max_posts")]
    max_posts: usize,
}

fn default_formats() -> Vec<String> {
    vec!["pdf".to_string(), "epub".to_string(), "html".to_string()]
}

fn default_max_posts() -> usize {
    100
}

async fn home(State(state): State<AppState>) -> Response {
    let html = pages::render_index(state.config.max_posts);
    Html(html.into_string()).into_response()
}

async fn start_processing(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> Response {
    let mut formats = Vec::new();
    for raw in &request.formats {
        match ExportFormat::from_str(raw) {
            Ok(format) => {
                if !formats.contains(&format) {
                    formats.push(format);
                }
            }
            Err(message) => {
                return error_response(StatusCode::BAD_REQUEST, &message);
            }
        }
    }

    match state.jobs.submit(&request.url, formats, request.max_posts) {
        Ok(job_id) => Json(json!({ "job_id": job_id })).into_response(),
        Err(e @ (SubmitError::EmptyUrl | SubmitError::NoFormatsRequested)) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e @ SubmitError::AtCapacity) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
    }
}

async fn job_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.jobs.status(id) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Job not found"),
    }
}

async fn queue_info(State(state): State<AppState>) -> Response {
    Json(state.jobs.queue_info()).into_response()
}

/// Serve a completed job's bundle, then delete the job.
///
/// Download is a one-shot, destructive read: the registry entry and the
/// job directory are removed once the bytes have been loaded for serving.
async fn download(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let path = match state.jobs.download_path(id) {
        Ok(path) => path,
        Err(DownloadError::NotFound) => {
            return error_response(StatusCode::NOT_FOUND, "Job not found");
        }
        Err(DownloadError::NotReady) => {
            return error_response(StatusCode::BAD_REQUEST, "Job not complete");
        }
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(StatusCode::NOT_FOUND, "Download file not found");
        }
    };

    state.jobs.remove(id);

    (
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"blogpack.zip\"",
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn health() -> &'static str {
    "OK"
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}
