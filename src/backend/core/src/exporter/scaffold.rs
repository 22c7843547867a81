//! Exporter that writes provider scaffolding only.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{files, ExportConfig, ExportMode, ExporterError, ResourceExporter};

pub const PROVIDER_SOURCE: &str = "registry.terraform.io/mypurecloud/genesyscloud";

/// Writes the provider block in each requested format, plus an empty state
/// file when asked. Useful for wiring checks and as a default binary backend.
#[derive(Debug, Clone)]
pub struct ScaffoldExporter {
    provider_version: String,
}

impl ScaffoldExporter {
    pub fn new(provider_version: impl Into<String>) -> Self {
        Self {
            provider_version: provider_version.into(),
        }
    }

    fn provider_hcl(&self) -> String {
        format!(
            "terraform {{\n  required_providers {{\n    genesyscloud = {{\n      source  = \"{}\"\n      version = \"{}\"\n    }}\n  }}\n}}\n",
            PROVIDER_SOURCE, self.provider_version
        )
    }

    fn provider_json(&self) -> serde_json::Value {
        json!({
            "terraform": {
                "required_providers": {
                    "genesyscloud": {
                        "source": PROVIDER_SOURCE,
                        "version": self.provider_version,
                    }
                }
            }
        })
    }
}

impl Default for ScaffoldExporter {
    fn default() -> Self {
        Self::new(">= 1.0.0")
    }
}

async fn write(dir: &Path, name: &str, contents: Vec<u8>, cancel: &CancellationToken) -> Result<(), ExporterError> {
    if cancel.is_cancelled() {
        return Err(ExporterError::Cancelled);
    }
    let path = dir.join(name);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| ExporterError::Io { path, source })
}

#[async_trait]
impl ResourceExporter for ScaffoldExporter {
    async fn export(
        &self,
        config: &ExportConfig,
        mode: ExportMode,
        cancel: &CancellationToken,
    ) -> Result<(), ExporterError> {
        tracing::info!(
            output_dir = %config.output_dir.display(),
            format = %config.format,
            mode = mode.as_str(),
            credentials = config.credentials.kind(),
            "Writing provider scaffolding"
        );

        if config.format.writes_hcl() {
            write(&config.output_dir, files::PROVIDER_HCL, self.provider_hcl().into_bytes(), cancel).await?;
        }

        if config.format.writes_json() {
            let body = serde_json::to_vec_pretty(&self.provider_json())
                .map_err(|e| ExporterError::Encode(files::PROVIDER_JSON, e))?;
            write(&config.output_dir, files::PROVIDER_JSON, body, cancel).await?;
        }

        if config.include_state_file {
            let state = json!({
                "version": 4,
                "terraform_version": "",
                "serial": 1,
                "lineage": uuid::Uuid::new_v4().to_string(),
                "outputs": {},
                "resources": [],
            });
            let body = serde_json::to_vec_pretty(&state).map_err(|e| ExporterError::Encode(files::STATE, e))?;
            write(&config.output_dir, files::STATE, body, cancel).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ClientConfig;
    use crate::jobs::ExportParams;

    fn config(dir: &Path, format: &str, state: bool) -> ExportConfig {
        let params = ExportParams {
            directory: "./out".into(),
            export_format: Some(format.into()),
            include_state_file: state,
            ..Default::default()
        };
        ExportConfig::from_params(&params, dir, ClientConfig::AccessToken("t".into())).unwrap()
    }

    #[tokio::test]
    async fn test_writes_requested_formats() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = ScaffoldExporter::default();

        exporter
            .export(&config(tmp.path(), "hcl_json", true), ExportMode::LegacyInclude, &CancellationToken::new())
            .await
            .unwrap();

        assert!(tmp.path().join(files::PROVIDER_HCL).is_file());
        assert!(tmp.path().join(files::PROVIDER_JSON).is_file());
        let state: serde_json::Value =
            serde_json::from_slice(&std::fs::read(tmp.path().join(files::STATE)).unwrap()).unwrap();
        assert_eq!(state["version"], 4);
    }

    #[tokio::test]
    async fn test_json_only() {
        let tmp = tempfile::tempdir().unwrap();
        ScaffoldExporter::default()
            .export(&config(tmp.path(), "json", false), ExportMode::LegacyInclude, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!tmp.path().join(files::PROVIDER_HCL).exists());
        assert!(!tmp.path().join(files::STATE).exists());
        let provider: serde_json::Value =
            serde_json::from_slice(&std::fs::read(tmp.path().join(files::PROVIDER_JSON)).unwrap()).unwrap();
        assert_eq!(
            provider["terraform"]["required_providers"]["genesyscloud"]["source"],
            PROVIDER_SOURCE
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let tmp = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ScaffoldExporter::default()
            .export(&config(tmp.path(), "hcl", false), ExportMode::LegacyInclude, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExporterError::Cancelled));
    }
}
