//! Prometheus metrics for the export job lifecycle.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::jobs::JobStatus;

/// Install the global Prometheus recorder.
///
/// Returns `None` when metrics are disabled; the `metrics` macros then no-op.
pub fn init_metrics(enabled: bool, service_name: &str) -> anyhow::Result<Option<PrometheusHandle>> {
    if !enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", service_name)
        .install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(Some(handle))
}

fn register_metric_descriptions() {
    describe_counter!("exportd_jobs_created_total", "Export jobs accepted");
    describe_counter!(
        "exportd_jobs_finished_total",
        "Export jobs that reached a terminal state, by status"
    );
    describe_counter!("exportd_jobs_purged_total", "Jobs removed by the cleanup sweep");
    describe_counter!("exportd_errors_total", "Service errors by code and category");
    describe_gauge!("exportd_jobs_running", "Export jobs currently holding a worker permit");
    describe_histogram!(
        "exportd_job_duration_seconds",
        "Wall time from dispatch to terminal state"
    );
}

pub fn record_job_created() {
    counter!("exportd_jobs_created_total").increment(1);
}

pub fn record_job_finished(status: JobStatus, elapsed: Duration) {
    counter!("exportd_jobs_finished_total", "status" => status.to_string()).increment(1);
    histogram!("exportd_job_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_jobs_purged(count: usize) {
    counter!("exportd_jobs_purged_total").increment(count as u64);
}

pub fn job_started() {
    gauge!("exportd_jobs_running").increment(1.0);
}

pub fn job_stopped() {
    gauge!("exportd_jobs_running").decrement(1.0);
}
