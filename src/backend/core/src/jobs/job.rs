//! Job definitions.
//!
//! This module provides the data model shared by the store, worker and API:
//!
//! - **JobId**: opaque identifier, also the name of the job's working directory
//! - **JobStatus**: the lifecycle states and which of them are terminal
//! - **Job**: the externally visible record plus its transition methods
//! - **ExportParams**: the caller-supplied export request
//! - **ExportFile**: a descriptor for one file in a finished export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, ServiceError};

/// File name of the packaged output inside each working directory.
pub const ARCHIVE_FILE_NAME: &str = "export.zip";

// ═══════════════════════════════════════════════════════════════════════════════
// Job Identification
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier for a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for JobId {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ServiceError::invalid_job_id(s))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not yet picked up by a worker
    Pending,
    /// The export is executing
    Running,
    /// Export and packaging succeeded
    Completed,
    /// Export or packaging failed
    Failed,
    /// Cancelled by the client
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Record
// ═══════════════════════════════════════════════════════════════════════════════

/// The externally visible state of one export job.
///
/// Transition methods return `false` and leave the record untouched when the
/// job is already terminal, so no sequence of calls can move a job out of
/// `Completed`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Percent complete, 0-100
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    /// Create a pending job with zero progress.
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_at: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record progress. Promotes `Pending` to `Running`; never lowers progress.
    pub fn set_progress(&mut self, percent: u8) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Running;
        self.progress = self.progress.max(percent.min(100));
        self.updated_at = Utc::now();
        true
    }

    /// Mark as completed.
    pub fn mark_completed(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Mark as failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        true
    }

    /// Mark as cancelled.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = JobStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Export Parameters
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Hcl,
    Json,
    /// Both, JSON first
    JsonHcl,
    /// Both, HCL first
    HclJson,
}

impl ExportFormat {
    pub const ALLOWED: [&'static str; 4] = ["hcl", "json", "json_hcl", "hcl_json"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hcl => "hcl",
            Self::Json => "json",
            Self::JsonHcl => "json_hcl",
            Self::HclJson => "hcl_json",
        }
    }

    pub fn writes_hcl(&self) -> bool {
        !matches!(self, Self::Json)
    }

    pub fn writes_json(&self) -> bool {
        !matches!(self, Self::Hcl)
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Json
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hcl" => Ok(Self::Hcl),
            "json" => Ok(Self::Json),
            "json_hcl" => Ok(Self::JsonHcl),
            "hcl_json" => Ok(Self::HclJson),
            _ => Err(ServiceError::invalid_format(s, &Self::ALLOWED)),
        }
    }
}

/// Caller-supplied description of what to export.
///
/// Most fields are passed through to the exporter untouched; only the
/// directory and the format are validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    /// Logical target directory of the export
    pub directory: String,
    /// Resource types (or `type::name` pairs) to include
    pub include_filter_resources: Vec<String>,
    /// Resource types to exclude
    pub exclude_filter_resources: Vec<String>,
    /// One of `hcl`, `json`, `json_hcl`, `hcl_json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_format: Option<String>,
    /// Legacy switch that forces HCL output
    pub export_as_hcl: bool,
    pub include_state_file: bool,
    pub split_files_by_resource: bool,
    pub log_permission_errors: bool,
    pub enable_dependency_resolution: bool,
    pub ignore_cyclic_deps: bool,
    pub export_computed: bool,
}

impl ExportParams {
    /// Check the fields the service itself depends on.
    pub fn validate(&self) -> Result<()> {
        if self.directory.trim().is_empty() {
            return Err(ServiceError::validation("Export directory must not be empty"));
        }
        self.format().map(|_| ())
    }

    /// Resolve the effective output format.
    pub fn format(&self) -> Result<ExportFormat> {
        if self.export_as_hcl {
            return Ok(ExportFormat::Hcl);
        }
        match self.export_format.as_deref() {
            None => Ok(ExportFormat::default()),
            Some(raw) => raw.parse(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Export Files
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of file found in a finished export, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// `.tf`, `.tf.json`, `.tfvars`
    Definition,
    /// `.tfstate`
    State,
    /// `.zip`
    Archive,
    /// Any other `.json`
    Json,
    Other,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tf") || lower.ends_with(".tf.json") || lower.ends_with(".tfvars") {
            Self::Definition
        } else if lower.ends_with(".tfstate") {
            Self::State
        } else if lower.ends_with(".zip") {
            Self::Archive
        } else if lower.ends_with(".json") {
            Self::Json
        } else {
            Self::Other
        }
    }
}

/// One file inside a completed job's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFile {
    /// Path relative to the working directory, `/`-separated
    pub name: String,
    /// Size in bytes
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

impl ExportFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let kind = FileKind::from_name(&name);
        Self { name, size, kind }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);

        let parsed: JobId = id1.to_string().parse().unwrap();
        assert_eq!(parsed, id1);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_job_status() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert_eq!(serde_json::to_string(&JobStatus::Cancelled).unwrap(), "\"cancelled\"");
    }

    #[test]
    fn test_progress_promotes_and_never_decreases() {
        let mut job = Job::new(JobId::new());
        assert!(job.set_progress(20));
        assert_eq!(job.status, JobStatus::Running);
        job.set_progress(10);
        assert_eq!(job.progress, 20);
        job.set_progress(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_terminal_is_sticky() {
        let mut job = Job::new(JobId::new());
        assert!(job.mark_cancelled());
        let snapshot = job.clone();

        assert!(!job.mark_completed());
        assert!(!job.mark_failed("late"));
        assert!(!job.mark_cancelled());
        assert!(!job.set_progress(90));
        assert_eq!(job, snapshot);
    }

    #[test]
    fn test_completed_pins_progress() {
        let mut job = Job::new(JobId::new());
        job.set_progress(80);
        job.mark_completed();
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("HCL".parse::<ExportFormat>().unwrap(), ExportFormat::Hcl);
        assert_eq!("json_hcl".parse::<ExportFormat>().unwrap(), ExportFormat::JsonHcl);
        assert!("yaml".parse::<ExportFormat>().is_err());
        assert!(ExportFormat::HclJson.writes_hcl() && ExportFormat::HclJson.writes_json());
        assert!(!ExportFormat::Json.writes_hcl());
    }

    #[test]
    fn test_params_validation() {
        let mut params = ExportParams::default();
        assert!(params.validate().is_err());

        params.directory = "./out".to_string();
        assert!(params.validate().is_ok());
        assert_eq!(params.format().unwrap(), ExportFormat::Json);

        params.export_format = Some("toml".to_string());
        assert!(params.validate().is_err());

        params.export_as_hcl = true;
        assert_eq!(params.format().unwrap(), ExportFormat::Hcl);
    }

    #[test]
    fn test_file_kind_inference() {
        assert_eq!(FileKind::from_name("genesyscloud.tf"), FileKind::Definition);
        assert_eq!(FileKind::from_name("genesyscloud.tf.json"), FileKind::Definition);
        assert_eq!(FileKind::from_name("terraform.tfvars"), FileKind::Definition);
        assert_eq!(FileKind::from_name("terraform.tfstate"), FileKind::State);
        assert_eq!(FileKind::from_name("export.zip"), FileKind::Archive);
        assert_eq!(FileKind::from_name("export_errors.json"), FileKind::Json);
        assert_eq!(FileKind::from_name("flows/main.yaml"), FileKind::Other);
    }

    #[test]
    fn test_export_file_serializes_type() {
        let file = ExportFile::new("terraform.tfstate", 42);
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["size"], 42);
    }
}
