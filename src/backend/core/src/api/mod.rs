//! HTTP API for export jobs.
//!
//! Handlers are thin: they parse the request, call the [`JobStore`] or the
//! [`ExportWorker`], and map the outcome to a status code. Every error is a
//! [`ServiceError`](crate::error::ServiceError) and renders the common error
//! body.

mod handlers;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::auth::Authenticator;
use crate::jobs::{ExportWorker, JobStore};

pub use handlers::{CreateExportResponse, JobMessage};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub worker: Arc<ExportWorker>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Root for defaulted export directories
    pub base_dir: PathBuf,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
