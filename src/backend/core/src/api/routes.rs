//! Route table.

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::{handlers, AppState};

/// Build the route table.
///
/// # Endpoints
///
/// ## Exports
/// - `POST /exports` - Create an export job
/// - `GET /exports/:id` - Job status
/// - `DELETE /exports/:id` - Cancel a job
/// - `GET|DELETE /exports/` - Rejected as an invalid job id
/// - `GET /exports/:id/results` - List the files of a completed job
/// - `GET /exports/:id/download` - Download the archive of a completed job
///
/// ## System
/// - `GET /health` - Liveness and job count
/// - `GET /metrics` - Prometheus exposition
pub fn router() -> Router<AppState> {
    Router::new()
        .route(paths::EXPORTS, post(handlers::create_export))
        .route(paths::EXPORT, get(handlers::get_export).delete(handlers::cancel_export))
        .route(
            paths::EXPORT_EMPTY_ID,
            get(handlers::missing_job_id).delete(handlers::missing_job_id),
        )
        .route(paths::EXPORT_RESULTS, get(handlers::get_export_results))
        .route(paths::EXPORT_DOWNLOAD, get(handlers::download_export))
        .route(paths::HEALTH, get(handlers::health_check))
        .route(paths::METRICS, get(handlers::prometheus_metrics))
}

/// Route constants for use in clients and tests.
pub mod paths {
    pub const EXPORTS: &str = "/exports";
    pub const EXPORT: &str = "/exports/:id";
    pub const EXPORT_EMPTY_ID: &str = "/exports/";
    pub const EXPORT_RESULTS: &str = "/exports/:id/results";
    pub const EXPORT_DOWNLOAD: &str = "/exports/:id/download";

    pub const HEALTH: &str = "/health";
    pub const METRICS: &str = "/metrics";

    /// Substitute `:id` in a route pattern.
    pub fn with_id(pattern: &str, id: impl std::fmt::Display) -> String {
        pattern.replace(":id", &id.to_string())
    }
}
