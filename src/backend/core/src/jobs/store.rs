//! In-memory job store.
//!
//! The store is the single authority on job state. Every mutation goes through
//! one `RwLock` so transitions are serialized; file system work happens after
//! the lock is released.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::job::{ExportFile, ExportParams, Job, JobId, JobStatus, ARCHIVE_FILE_NAME};
use crate::error::{ErrorCode, Result, ServiceError};
use crate::telemetry::metrics;

/// Listing of a completed job's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResults {
    pub job_id: JobId,
    pub export_directory: String,
    pub files: Vec<ExportFile>,
}

struct JobEntry {
    job: Job,
    dir: PathBuf,
    cancel: Option<CancellationToken>,
}

/// Thread-safe registry of export jobs keyed by id.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    base_dir: PathBuf,
    max_job_age: Duration,
}

impl JobStore {
    pub fn new(base_dir: impl Into<PathBuf>, max_job_age: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            base_dir: base_dir.into(),
            max_job_age,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Validate `params`, allocate an id and its working directory, and record
    /// a pending job.
    pub async fn create_job(&self, params: &ExportParams) -> Result<JobId> {
        params.validate()?;

        loop {
            let id = JobId::new();
            if self.jobs.read().contains_key(&id) {
                continue;
            }

            let dir = self.base_dir.join(id.to_string());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ServiceError::directory_creation_failed(dir.display(), e))?;

            let mut jobs = self.jobs.write();
            if jobs.contains_key(&id) {
                continue;
            }
            jobs.insert(
                id,
                JobEntry {
                    job: Job::new(id),
                    dir,
                    cancel: None,
                },
            );
            drop(jobs);

            metrics::record_job_created();
            tracing::info!(job_id = %id, directory = %params.directory, "Export job created");
            return Ok(id);
        }
    }

    /// Snapshot of a job.
    pub fn get_job_status(&self, id: JobId) -> Result<Job> {
        self.jobs
            .read()
            .get(&id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| ServiceError::job_not_found(id))
    }

    /// Attach the cancellation handle of the task executing `id`.
    ///
    /// A job that is already terminal gets its token cancelled on the spot.
    pub fn register_cancellation(&self, id: JobId, token: CancellationToken) -> Result<()> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(&id).ok_or_else(|| ServiceError::job_not_found(id))?;
        if entry.job.is_terminal() {
            token.cancel();
        } else {
            entry.cancel = Some(token);
        }
        Ok(())
    }

    /// Cancel a non-terminal job and return its new state. Terminal jobs are
    /// returned unchanged.
    pub fn cancel_job(&self, id: JobId) -> Result<Job> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(&id).ok_or_else(|| ServiceError::job_not_found(id))?;

        if entry.job.mark_cancelled() {
            if let Some(token) = entry.cancel.take() {
                token.cancel();
            }
            metrics::record_job_finished(JobStatus::Cancelled, elapsed_since(entry.job.created_at));
            tracing::info!(job_id = %id, "Export job cancelled");
        }

        Ok(entry.job.clone())
    }

    /// List the files a completed job produced, sorted by name.
    pub async fn get_job_results(&self, id: JobId) -> Result<JobResults> {
        let dir = self.completed_dir(id)?;

        let walk_dir = dir.clone();
        let files = tokio::task::spawn_blocking(move || list_export_files(&walk_dir))
            .await?
            .map_err(|e| {
                ServiceError::with_internal(
                    ErrorCode::FileSystemError,
                    "Failed to read export results",
                    format!("{}: {}", dir.display(), e),
                )
            })?;

        Ok(JobResults {
            job_id: id,
            export_directory: dir.display().to_string(),
            files,
        })
    }

    /// Bytes of a completed job's archive.
    pub async fn get_job_files(&self, id: JobId) -> Result<Vec<u8>> {
        let path = self.completed_dir(id)?.join(ARCHIVE_FILE_NAME);

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ServiceError::archive_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Record progress for a running job. Ignored once the job is terminal.
    pub fn update_job_progress(&self, id: JobId, percent: u8) -> Result<()> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(&id).ok_or_else(|| ServiceError::job_not_found(id))?;
        if entry.job.set_progress(percent) {
            tracing::debug!(job_id = %id, progress = entry.job.progress, "Export job progress");
        }
        Ok(())
    }

    /// Move a job to `Completed` or `Failed`.
    ///
    /// Returns `false` without touching the job when it is already terminal.
    pub fn complete_job(&self, id: JobId, success: bool, error_message: Option<String>) -> Result<bool> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(&id).ok_or_else(|| ServiceError::job_not_found(id))?;

        let transitioned = if success {
            entry.job.mark_completed()
        } else {
            entry
                .job
                .mark_failed(error_message.unwrap_or_else(|| "export failed".to_string()))
        };

        if transitioned {
            entry.cancel = None;
            metrics::record_job_finished(entry.job.status, elapsed_since(entry.job.created_at));
            match entry.job.status {
                JobStatus::Failed => tracing::warn!(
                    job_id = %id,
                    error = entry.job.error_message.as_deref().unwrap_or_default(),
                    "Export job failed"
                ),
                status => tracing::info!(job_id = %id, status = %status, "Export job finished"),
            }
        }

        Ok(transitioned)
    }

    /// Purge every job older than the configured maximum age.
    pub async fn cleanup_old_jobs(&self) -> usize {
        let max_age = match chrono::Duration::from_std(self.max_job_age) {
            Ok(age) => age,
            Err(_) => return 0,
        };
        match Utc::now().checked_sub_signed(max_age) {
            Some(cutoff) => self.cleanup_jobs_created_before(cutoff).await,
            None => 0,
        }
    }

    /// Purge every job created before `cutoff`, whatever its status, and
    /// delete its working directory.
    pub async fn cleanup_jobs_created_before(&self, cutoff: DateTime<Utc>) -> usize {
        let purged: Vec<(JobId, JobEntry)> = {
            let mut jobs = self.jobs.write();
            let stale: Vec<JobId> = jobs
                .iter()
                .filter(|(_, entry)| entry.job.created_at < cutoff)
                .map(|(id, _)| *id)
                .collect();
            stale
                .into_iter()
                .filter_map(|id| jobs.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (id, entry) in &purged {
            if let Some(token) = &entry.cancel {
                token.cancel();
            }
            if let Err(e) = tokio::fs::remove_dir_all(&entry.dir).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        job_id = %id,
                        dir = %entry.dir.display(),
                        error = %e,
                        "Failed to remove job directory"
                    );
                }
            }
        }

        if !purged.is_empty() {
            metrics::record_jobs_purged(purged.len());
            tracing::info!(purged = purged.len(), cutoff = %cutoff, "Old export jobs purged");
        }

        purged.len()
    }

    /// Working directory of a job.
    pub fn job_dir(&self, id: JobId) -> Result<PathBuf> {
        self.jobs
            .read()
            .get(&id)
            .map(|entry| entry.dir.clone())
            .ok_or_else(|| ServiceError::job_not_found(id))
    }

    pub fn is_terminal(&self, id: JobId) -> Result<bool> {
        self.get_job_status(id).map(|job| job.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// All jobs, oldest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().map(|entry| entry.job.clone()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    fn completed_dir(&self, id: JobId) -> Result<PathBuf> {
        let jobs = self.jobs.read();
        let entry = jobs.get(&id).ok_or_else(|| ServiceError::job_not_found(id))?;
        if entry.job.status != JobStatus::Completed {
            return Err(ServiceError::job_not_completed(id, entry.job.status));
        }
        Ok(entry.dir.clone())
    }
}

fn elapsed_since(start: DateTime<Utc>) -> Duration {
    (Utc::now() - start).to_std().unwrap_or_default()
}

/// Relative `/`-separated path of `path` under `root`.
pub(crate) fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn list_export_files(dir: &Path) -> io::Result<Vec<ExportFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = relative_name(dir, entry.path()) else {
            continue;
        };
        if name == ARCHIVE_FILE_NAME {
            continue;
        }
        let size = entry.metadata()?.len();
        files.push(ExportFile::new(name, size));
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
