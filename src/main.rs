//! customer-sync - Incremental one-way customer synchronization
//!
//! Performs exactly one sync pass from the source API into the destination
//! API and exits. Periodic invocation is left to an external scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use customer_sync::config::Config;
use customer_sync::destination::HttpDestinationClient;
use customer_sync::otel::{init_tracing, run_status, SyncMetrics, Telemetry};
use customer_sync::source::HttpSourceReader;
use customer_sync::sync::ReconciliationEngine;
use customer_sync::watermark::FileWatermarkStore;

/// customer-sync - Incremental one-way customer synchronization
#[derive(Parser, Debug)]
#[command(name = "customer-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CUSTOMER_SYNC_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    // Initialize OpenTelemetry metrics
    let telemetry = Telemetry::new(&config.otel)?;
    let metrics = SyncMetrics::new(&telemetry.meter());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        otel_enabled = telemetry.is_enabled(),
        "Starting customer-sync"
    );

    let source = HttpSourceReader::new(&config.source)?;
    let destination = HttpDestinationClient::new(&config.destination)?;
    let store = FileWatermarkStore::new(&config.sync.watermark_path);

    // Hold the run lease until the process exits
    let lease = match store.try_lease() {
        Ok(lease) => lease,
        Err(e) => {
            error!(error = %e, "Another sync run is in progress");
            shutdown_telemetry(&telemetry);
            return Err(e.into());
        }
    };
    info!(path = %lease.path().display(), "Run lease acquired");

    let engine = ReconciliationEngine::new(
        Arc::new(source),
        Arc::new(destination),
        Arc::new(store),
        config.sync.max_concurrent_requests,
    );

    let deadline = (config.sync.run_timeout_secs > 0)
        .then(|| Duration::from_secs(config.sync.run_timeout_secs));

    let started = Instant::now();
    let result = tokio::select! {
        result = engine.run_with_deadline(deadline) => result,
        _ = shutdown_signal() => {
            warn!("Sync run interrupted, watermark not advanced");
            shutdown_telemetry(&telemetry);
            anyhow::bail!("Sync run interrupted");
        }
    };
    let elapsed = started.elapsed();

    metrics.record_run(&result, elapsed);

    match &result {
        Ok(report) => info!(
            duration_ms = elapsed.as_millis() as u64,
            created = report.statistics.created,
            updated = report.statistics.updated,
            errors = report.statistics.errors,
            watermark_advanced = report.advanced(),
            "customer-sync finished"
        ),
        Err(e) => error!(
            duration_ms = elapsed.as_millis() as u64,
            status = run_status(&result),
            error = %e,
            "customer-sync failed"
        ),
    }

    shutdown_telemetry(&telemetry);
    drop(lease);

    result.map(|_| ()).map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path)
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env()
        }
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    Ok(config)
}

fn shutdown_telemetry(telemetry: &Telemetry) {
    if let Err(e) = telemetry.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
