#![allow(clippy::result_large_err)]
//! # exportd
//!
//! Asynchronous export job service.
//!
//! ## Architecture
//!
//! - **Jobs**: in-memory job store, background worker with a concurrency
//!   limit and deadline, zip packaging, periodic sweep of old jobs
//! - **Exporter**: the pluggable export operation the worker drives
//! - **Auth**: turns request headers into platform credentials
//! - **API**: Axum routes for creating, inspecting, cancelling and
//!   downloading exports
//! - **Service**: wiring, listener, graceful shutdown
//! - **Telemetry**: structured logging, OTLP tracing and Prometheus metrics

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod exporter;
pub mod jobs;
pub mod service;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, Result, ServiceError};
pub use service::ExportService;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::auth::{Authenticator, ClientConfig, HeaderAuthenticator};
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, Result, ServiceError};
    pub use crate::exporter::{ExportConfig, ExportMode, ExporterError, ResourceExporter, ScaffoldExporter};
    pub use crate::jobs::{ExportParams, ExportWorker, Job, JobId, JobStatus, JobStore};
    pub use crate::service::ExportService;
}
