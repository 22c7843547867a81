//! Configuration management.
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional config file, and `EXPORTD_`-prefixed environment variables using
//! `__` as the nesting separator, e.g. `EXPORTD_JOBS__JOB_TIMEOUT=45m`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::telemetry::LogFormat;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "EXPORTD";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Export job configuration
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long in-flight requests may run after a shutdown signal
    #[serde(default = "default_shutdown_grace_period", with = "humantime_serde")]
    pub shutdown_grace_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_period: default_shutdown_grace_period(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Root under which every job gets its working directory
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Maximum number of exports executing at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Deadline for a single export, measured from when it starts executing
    #[serde(default = "default_job_timeout", with = "humantime_serde")]
    pub job_timeout: Duration,

    /// Interval between sweeps of old jobs
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Jobs created longer ago than this are purged by the sweep
    #[serde(default = "default_max_job_age", with = "humantime_serde")]
    pub max_job_age: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout: default_job_timeout(),
            cleanup_interval: default_cleanup_interval(),
            max_job_age: default_max_job_age(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: Option<String>,

    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Include file and line in log records
    #[serde(default)]
    pub include_location: bool,

    /// Install the Prometheus recorder and serve `/metrics`
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            include_location: false,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_grace_period() -> Duration { Duration::from_secs(30) }
fn default_base_dir() -> PathBuf { PathBuf::from("./exports") }
fn default_max_concurrent_jobs() -> usize { 5 }
fn default_job_timeout() -> Duration { Duration::from_secs(30 * 60) }
fn default_cleanup_interval() -> Duration { Duration::from_secs(60 * 60) }
fn default_max_job_age() -> Duration { Duration::from_secs(24 * 60 * 60) }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_enabled() -> bool { true }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with the environment layered on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(ServiceError::configuration("jobs.max_concurrent_jobs must be at least 1"));
        }
        if self.jobs.cleanup_interval.is_zero() {
            return Err(ServiceError::configuration("jobs.cleanup_interval must be greater than zero"));
        }
        if self.jobs.base_dir.as_os_str().is_empty() {
            return Err(ServiceError::configuration("jobs.base_dir must not be empty"));
        }
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
