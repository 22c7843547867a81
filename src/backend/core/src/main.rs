//! exportd server - main entry point

use std::net::SocketAddr;
use std::sync::Arc;

use exportd_core::{
    auth::HeaderAuthenticator,
    config::Config,
    exporter::ScaffoldExporter,
    telemetry, ExportService,
};

const SERVICE_NAME: &str = "exportd";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match std::env::var("EXPORTD_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };

    // Initialize observability
    telemetry::init(SERVICE_NAME, &config.observability)?;
    let metrics = telemetry::metrics::init_metrics(config.observability.metrics_enabled, SERVICE_NAME)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_dir = %config.jobs.base_dir.display(),
        max_concurrent_jobs = config.jobs.max_concurrent_jobs,
        "Starting exportd"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service = ExportService::new(
        config,
        Arc::new(ScaffoldExporter::default()),
        Arc::new(HeaderAuthenticator::from_env()),
    )
    .with_metrics(metrics);

    let result = service.run(listener, shutdown_signal()).await;

    // Cleanup
    telemetry::shutdown();
    tracing::info!("Server shutdown complete");

    result
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
