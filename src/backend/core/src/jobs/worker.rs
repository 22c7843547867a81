//! Background execution of export jobs.
//!
//! Each dispatched job runs on its own task. A semaphore bounds how many
//! exports execute at once; jobs waiting for a permit stay `pending` and can
//! still be cancelled.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::archive::{self, ArchiveError};
use super::job::{ExportParams, JobId};
use super::store::JobStore;
use crate::auth::ClientConfig;
use crate::error::{Result, ServiceError};
use crate::exporter::{ExportConfig, ExportMode, ExporterError, ResourceExporter};
use crate::telemetry::metrics;

/// Progress checkpoints reported while a job runs.
pub mod progress {
    pub const STARTED: u8 = 10;
    pub const CONFIGURED: u8 = 20;
    pub const EXPORTED: u8 = 80;
}

/// Reasons a job did not complete.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid export configuration: {0}")]
    Config(String),

    #[error("export failed: {0}")]
    Export(#[source] ExporterError),

    #[error("export timed out after {0:?}")]
    TimedOut(Duration),

    #[error("export cancelled")]
    Cancelled,

    #[error("failed to package export: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Store(#[from] ServiceError),
}

impl From<ExporterError> for WorkerError {
    fn from(err: ExporterError) -> Self {
        match err {
            ExporterError::Cancelled => Self::Cancelled,
            other => Self::Export(other),
        }
    }
}

/// Per-run execution context.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub cancel: CancellationToken,
    pub deadline: Instant,
}

impl JobContext {
    pub fn new(job_id: JobId, cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            job_id,
            cancel,
            deadline: Instant::now() + timeout,
        }
    }
}

/// Runs export jobs against a [`ResourceExporter`].
pub struct ExportWorker {
    store: Arc<JobStore>,
    exporter: Arc<dyn ResourceExporter>,
    limiter: Arc<Semaphore>,
    job_timeout: Duration,
}

impl ExportWorker {
    pub fn new(
        store: Arc<JobStore>,
        exporter: Arc<dyn ResourceExporter>,
        max_concurrent_jobs: usize,
        job_timeout: Duration,
    ) -> Self {
        Self {
            store,
            exporter,
            limiter: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            job_timeout,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Permits not currently held by a running export.
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Start `id` on a background task and register its cancellation token
    /// with the store. Returns immediately.
    pub fn dispatch(
        self: &Arc<Self>,
        id: JobId,
        params: ExportParams,
        credentials: ClientConfig,
    ) -> Result<CancellationToken> {
        let token = CancellationToken::new();
        self.store.register_cancellation(id, token.clone())?;

        let worker = Arc::clone(self);
        let cancel = token.clone();
        tokio::spawn(
            async move { worker.run(id, params, credentials, cancel).await }
                .instrument(tracing::info_span!("export_job", job_id = %id)),
        );

        Ok(token)
    }

    async fn run(&self, id: JobId, params: ExportParams, credentials: ClientConfig, cancel: CancellationToken) {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Export job cancelled while queued");
                return;
            }
            permit = Arc::clone(&self.limiter).acquire_owned() => permit,
        };
        let Ok(_permit) = permit else {
            self.finish(id, Err(WorkerError::Config("worker pool closed".to_string())));
            return;
        };

        metrics::job_started();
        let ctx = JobContext::new(id, cancel, self.job_timeout);
        self.process_job(&ctx, &params, credentials).await;
        metrics::job_stopped();
    }

    /// Drive one job to a terminal state.
    pub async fn process_job(&self, ctx: &JobContext, params: &ExportParams, credentials: ClientConfig) {
        let outcome = self.execute(ctx, params, credentials).await;
        self.finish(ctx.job_id, outcome);
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        params: &ExportParams,
        credentials: ClientConfig,
    ) -> std::result::Result<(), WorkerError> {
        let id = ctx.job_id;
        self.store.update_job_progress(id, progress::STARTED)?;

        let output_dir = self.store.job_dir(id)?;
        let config = ExportConfig::from_params(params, output_dir.clone(), credentials)
            .map_err(|e| WorkerError::Config(e.user_message().to_string()))?;

        self.store.update_job_progress(id, progress::CONFIGURED)?;
        let mode = ExportMode::select(params);
        tracing::info!(mode = mode.as_str(), format = %config.format, "Starting export");

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(WorkerError::Cancelled),
            _ = tokio::time::sleep_until(ctx.deadline) => {
                ctx.cancel.cancel();
                return Err(WorkerError::TimedOut(self.job_timeout));
            }
            result = self.exporter.export(&config, mode, &ctx.cancel) => result?,
        }

        self.store.update_job_progress(id, progress::EXPORTED)?;

        // Cancelled while the exporter was finishing.
        if self.store.is_terminal(id)? {
            return Err(WorkerError::Cancelled);
        }

        archive::package_directory(&output_dir).await?;
        Ok(())
    }

    fn finish(&self, id: JobId, outcome: std::result::Result<(), WorkerError>) {
        let result = match outcome {
            Ok(()) => self.store.complete_job(id, true, None),
            Err(WorkerError::Cancelled) => {
                tracing::debug!("Export stopped after cancellation");
                return;
            }
            Err(err) => self.store.complete_job(id, false, Some(err.to_string())),
        };

        if let Err(err) = result {
            // Purged by the sweep while running.
            tracing::debug!(error = %err, "Could not record export outcome");
        }
    }
}
