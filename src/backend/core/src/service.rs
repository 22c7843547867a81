//! Service lifecycle.
//!
//! [`ExportService`] owns the store, the worker and the collaborators, serves
//! the API on a listener, runs the sweep, and shuts both down when the
//! supplied shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::{self, AppState};
use crate::auth::Authenticator;
use crate::config::Config;
use crate::exporter::ResourceExporter;
use crate::jobs::{ExportWorker, JobStore, Sweeper};

pub struct ExportService {
    config: Config,
    store: Arc<JobStore>,
    worker: Arc<ExportWorker>,
    authenticator: Arc<dyn Authenticator>,
    metrics: Option<PrometheusHandle>,
}

impl ExportService {
    pub fn new(
        config: Config,
        exporter: Arc<dyn ResourceExporter>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let store = Arc::new(JobStore::new(
            config.jobs.base_dir.clone(),
            config.jobs.max_job_age,
        ));
        let worker = Arc::new(ExportWorker::new(
            Arc::clone(&store),
            exporter,
            config.jobs.max_concurrent_jobs,
            config.jobs.job_timeout,
        ));

        Self {
            config,
            store,
            worker,
            authenticator,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this recorder handle.
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> Router {
        api::build_router(AppState {
            store: Arc::clone(&self.store),
            worker: Arc::clone(&self.worker),
            authenticator: Arc::clone(&self.authenticator),
            base_dir: self.config.jobs.base_dir.clone(),
            metrics: self.metrics.clone(),
        })
    }

    /// Serve until `shutdown` resolves or the server stops on its own.
    ///
    /// Export jobs still running at that point are left to finish or die with
    /// the process; only the server and the sweep are awaited, and only for
    /// the configured grace period.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::fs::create_dir_all(&self.config.jobs.base_dir).await?;

        let root = CancellationToken::new();
        let tracker = TaskTracker::new();

        let sweeper = Sweeper::new(Arc::clone(&self.store), self.config.jobs.cleanup_interval);
        tracker.spawn(sweeper.run(root.child_token()));

        let app = self.router();
        let server_token = root.clone();
        tracing::info!(address = %listener.local_addr()?, "Starting HTTP server");
        let mut server = tracker.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
        });
        tracker.close();

        let server_exit = tokio::select! {
            _ = shutdown => None,
            exit = &mut server => Some(exit),
        };

        tracing::info!("Shutting down");
        root.cancel();

        let grace = self.config.server.shutdown_grace_period;
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            tracing::warn!(grace_period = ?grace, "Shutdown grace period elapsed with tasks still running");
        }

        match server_exit {
            Some(Ok(Err(e))) => Err(e.into()),
            Some(Err(e)) => Err(e.into()),
            _ => Ok(()),
        }
    }
}
