//! The export operation seam.
//!
//! The worker knows nothing about how resources are discovered or written. It
//! builds an [`ExportConfig`], picks an [`ExportMode`] and hands both to a
//! [`ResourceExporter`], which writes its output under
//! [`ExportConfig::output_dir`].

mod scaffold;

pub use scaffold::{ScaffoldExporter, PROVIDER_SOURCE};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::ClientConfig;
use crate::error::Result;
use crate::jobs::{ExportFormat, ExportParams};

/// File names the exporter writes.
pub mod files {
    pub const PROVIDER_HCL: &str = "provider.tf";
    pub const PROVIDER_JSON: &str = "provider.tf.json";
    pub const STATE: &str = "terraform.tfstate";
}

/// How the resource filters are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Only resources matching the include filter
    IncludeFilter,
    /// Everything except resources matching the exclude filter
    ExcludeFilter,
    /// No filter at all
    LegacyInclude,
}

impl ExportMode {
    /// Include wins over exclude; neither means everything.
    pub fn select(params: &ExportParams) -> Self {
        if !params.include_filter_resources.is_empty() {
            Self::IncludeFilter
        } else if !params.exclude_filter_resources.is_empty() {
            Self::ExcludeFilter
        } else {
            Self::LegacyInclude
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncludeFilter => "include_filter",
            Self::ExcludeFilter => "exclude_filter",
            Self::LegacyInclude => "legacy_include",
        }
    }
}

/// Everything an exporter needs for one run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Logical target directory from the request
    pub directory: String,
    /// Where output must be written
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    pub include_filter_resources: Vec<String>,
    pub exclude_filter_resources: Vec<String>,
    pub include_state_file: bool,
    pub split_files_by_resource: bool,
    pub log_permission_errors: bool,
    /// Only honoured together with a non-empty include filter
    pub enable_dependency_resolution: bool,
    pub ignore_cyclic_deps: bool,
    pub export_computed: bool,
    pub credentials: ClientConfig,
}

impl ExportConfig {
    pub fn from_params(
        params: &ExportParams,
        output_dir: impl Into<PathBuf>,
        credentials: ClientConfig,
    ) -> Result<Self> {
        Ok(Self {
            directory: params.directory.clone(),
            output_dir: output_dir.into(),
            format: params.format()?,
            include_filter_resources: params.include_filter_resources.clone(),
            exclude_filter_resources: params.exclude_filter_resources.clone(),
            include_state_file: params.include_state_file,
            split_files_by_resource: params.split_files_by_resource,
            log_permission_errors: params.log_permission_errors,
            enable_dependency_resolution: params.enable_dependency_resolution
                && !params.include_filter_resources.is_empty(),
            ignore_cyclic_deps: params.ignore_cyclic_deps,
            export_computed: params.export_computed,
            credentials,
        })
    }
}

/// Errors an exporter may report.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("export cancelled")]
    Cancelled,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {0}: {1}")]
    Encode(&'static str, #[source] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// An export operation. Must observe `cancel` and stop promptly once it fires.
#[async_trait]
pub trait ResourceExporter: Send + Sync {
    async fn export(
        &self,
        config: &ExportConfig,
        mode: ExportMode,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ExporterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ExportParams {
        ExportParams {
            directory: "./out".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_selection() {
        let mut p = params();
        assert_eq!(ExportMode::select(&p), ExportMode::LegacyInclude);

        p.exclude_filter_resources = vec!["genesyscloud_user".into()];
        assert_eq!(ExportMode::select(&p), ExportMode::ExcludeFilter);

        p.include_filter_resources = vec!["genesyscloud_queue".into()];
        assert_eq!(ExportMode::select(&p), ExportMode::IncludeFilter);
    }

    #[test]
    fn test_dependency_resolution_needs_include_filter() {
        let creds = ClientConfig::AccessToken("t".into());
        let mut p = params();
        p.enable_dependency_resolution = true;

        let config = ExportConfig::from_params(&p, "/tmp/x", creds.clone()).unwrap();
        assert!(!config.enable_dependency_resolution);

        p.include_filter_resources = vec!["genesyscloud_flow".into()];
        let config = ExportConfig::from_params(&p, "/tmp/x", creds).unwrap();
        assert!(config.enable_dependency_resolution);
    }

    #[test]
    fn test_legacy_hcl_flag() {
        let mut p = params();
        p.export_format = Some("json".into());
        p.export_as_hcl = true;
        let config = ExportConfig::from_params(&p, "/tmp/x", ClientConfig::AccessToken("t".into())).unwrap();
        assert_eq!(config.format, ExportFormat::Hcl);
    }
}
