//! Export job system.
//!
//! - **Job**: data model and lifecycle transitions
//! - **Store**: the authoritative in-memory registry of jobs
//! - **Worker**: background execution with a concurrency limit and deadline
//! - **Archive**: packaging of a finished job's directory
//! - **Sweeper**: periodic purge of old jobs
//!
//! ```text
//!  POST /exports ──▶ JobStore::create_job ──▶ ExportWorker::dispatch
//!                                                   │
//!             ┌─────────────────────────────────────┘
//!             ▼
//!   ResourceExporter::export ──▶ archive::package_directory ──▶ complete_job
//! ```

mod archive;
mod job;
mod store;
mod sweeper;
mod worker;

pub use archive::{package_directory, ArchiveError};
pub use job::{
    ExportFile, ExportFormat, ExportParams, FileKind, Job, JobId, JobStatus, ARCHIVE_FILE_NAME,
};
pub use store::{JobResults, JobStore};
pub use sweeper::Sweeper;
pub use worker::{progress, ExportWorker, JobContext, WorkerError};
