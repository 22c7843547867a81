//! API request handlers.
//!
//! Handlers return `Result<Response, ServiceError>`; errors become the common
//! JSON error body with the status their code maps to.
//!
//! Two status conventions are part of the contract: a completed job answers
//! `GET /exports/:id` with 204, and results of an unfinished job are a 204
//! with an explanatory body. Both still carry a JSON body.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{Result, ServiceError};
use crate::jobs::{ExportParams, Job, JobId, JobStatus};

// ═══════════════════════════════════════════════════════════════════════════════
// DTOs
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateExportResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Status plus a human-readable explanation.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

fn parse_id(raw: &str) -> Result<JobId> {
    raw.parse()
}

// ═══════════════════════════════════════════════════════════════════════════════
// System
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "jobs": state.store.len(),
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Export Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn create_export(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<ExportParams>, JsonRejection>,
) -> Result<Response> {
    let credentials = state.authenticator.authenticate(&headers).await?;
    let Json(mut params) = body?;

    if params.directory.trim().is_empty() {
        params.directory = state.base_dir.join("default").display().to_string();
    }

    let id = state.store.create_job(&params).await?;
    let job = state.store.get_job_status(id)?;
    state.worker.dispatch(id, params, credentials)?;

    let response = CreateExportResponse {
        job_id: id,
        status: JobStatus::Pending,
        created_at: job.created_at,
    };
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

pub async fn get_export(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let job: Job = state.store.get_job_status(parse_id(&id)?)?;

    let status = if job.status == JobStatus::Completed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::OK
    };
    Ok((status, Json(job)).into_response())
}

pub async fn cancel_export(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id = parse_id(&id)?;
    let job = state.store.cancel_job(id)?;

    if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
        let body = JobMessage {
            job_id: id,
            status: job.status,
            message: format!("Export job already {}; nothing to cancel", job.status),
        };
        return Ok((StatusCode::NO_CONTENT, Json(body)).into_response());
    }

    Ok((StatusCode::OK, Json(job)).into_response())
}

/// `/exports/` with an empty id segment.
pub async fn missing_job_id() -> Result<Response> {
    Err(ServiceError::invalid_job_id(""))
}

pub async fn get_export_results(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id = parse_id(&id)?;
    let job = state.store.get_job_status(id)?;

    if job.status != JobStatus::Completed {
        let message = match job.status {
            JobStatus::Failed => format!(
                "Export job failed: {}",
                job.error_message.as_deref().unwrap_or("unknown error")
            ),
            JobStatus::Cancelled => "Export job was cancelled".to_string(),
            _ => format!("Export job is still in progress ({}%)", job.progress),
        };
        let body = JobMessage {
            job_id: id,
            status: job.status,
            message,
        };
        return Ok((StatusCode::NO_CONTENT, Json(body)).into_response());
    }

    let results = state.store.get_job_results(id).await?;
    Ok((StatusCode::OK, Json(results)).into_response())
}

pub async fn download_export(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id = parse_id(&id)?;
    let bytes = state.store.get_job_files(id).await?;

    let disposition = format!("attachment; filename=\"export-{}.zip\"", id);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
