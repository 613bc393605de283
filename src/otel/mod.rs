//! Observability for customer-sync
//!
//! Logging goes through `tracing` with a JSON or pretty formatter. Run
//! metrics are recorded with OpenTelemetry and exported over OTLP when
//! enabled; otherwise they stay in an in-process provider with no reader.

use crate::config::{LoggingConfig, OtelConfig};
use crate::error::SyncError;
use crate::models::RunStatistics;
use crate::sync::RunReport;
use opentelemetry::{
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, Resource};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to initialize the tracing subscriber
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Owns the meter provider for one process
pub struct Telemetry {
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl Telemetry {
    /// Create the meter provider for the given configuration
    ///
    /// When enabled, must be called from within a Tokio runtime.
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let meter_provider = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;
            Self::init_meter_provider(endpoint, resource)?
        } else {
            SdkMeterProvider::builder().with_resource(resource).build()
        };

        Ok(Self {
            meter_provider,
            config: config.clone(),
        })
    }

    fn init_meter_provider(
        endpoint: &str,
        resource: Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio).build();

        Ok(SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build())
    }

    /// Meter for creating instruments
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    /// Check if OTLP export is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flush pending exports and shut the provider down
    pub fn shutdown(&self) -> Result<(), OtelError> {
        self.meter_provider
            .shutdown()
            .map_err(|e| OtelError::Shutdown(format!("Meter shutdown failed: {:?}", e)))
    }
}

/// Metrics recorded once per sync run
pub struct SyncMetrics {
    /// Records returned by the source
    pub records_fetched_total: Counter<u64>,

    /// Destination records created
    pub records_created_total: Counter<u64>,

    /// Destination records updated
    pub records_updated_total: Counter<u64>,

    /// Records that failed to reconcile
    pub record_errors_total: Counter<u64>,

    /// Runs by final status
    pub runs_total: Counter<u64>,

    /// Wall-clock duration of a run in seconds
    pub run_duration: Histogram<f64>,
}

impl SyncMetrics {
    /// Create the instruments on the given meter
    pub fn new(meter: &Meter) -> Self {
        let records_fetched_total = meter
            .u64_counter("customer_sync_records_fetched_total")
            .with_description("Total number of customers fetched from the source")
            .init();

        let records_created_total = meter
            .u64_counter("customer_sync_records_created_total")
            .with_description("Total number of customers created in the destination")
            .init();

        let records_updated_total = meter
            .u64_counter("customer_sync_records_updated_total")
            .with_description("Total number of customers updated in the destination")
            .init();

        let record_errors_total = meter
            .u64_counter("customer_sync_record_errors_total")
            .with_description("Total number of customers that failed to reconcile")
            .init();

        let runs_total = meter
            .u64_counter("customer_sync_runs_total")
            .with_description("Total number of sync runs by status")
            .init();

        let run_duration = meter
            .f64_histogram("customer_sync_run_duration_seconds")
            .with_description("Sync run duration in seconds")
            .init();

        Self {
            records_fetched_total,
            records_created_total,
            records_updated_total,
            record_errors_total,
            runs_total,
            run_duration,
        }
    }

    /// Record the outcome of one run
    ///
    /// Record counters are added whenever dispatch completed, including runs
    /// that then failed to persist the watermark.
    pub fn record_run(&self, result: &Result<RunReport, SyncError>, duration: Duration) {
        let status = run_status(result);
        let attributes = [KeyValue::new("status", status)];

        if let Some(stats) = counted_statistics(result) {
            self.records_fetched_total.add(stats.records_fetched, &[]);
            self.records_created_total.add(stats.created, &[]);
            self.records_updated_total.add(stats.updated, &[]);
            self.record_errors_total.add(stats.errors, &[]);
        }

        self.runs_total.add(1, &attributes);
        self.run_duration
            .record(duration.as_secs_f64(), &attributes);
    }
}

/// Statistics of a run whose dispatch completed
fn counted_statistics(result: &Result<RunReport, SyncError>) -> Option<&RunStatistics> {
    match result {
        Ok(report) => Some(&report.statistics),
        Err(e) => e.statistics(),
    }
}

/// Status label for a run result
pub fn run_status(result: &Result<RunReport, SyncError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(SyncError::Extraction(_)) => "extraction_failed",
        Err(SyncError::Persistence { .. }) => "persistence_failed",
        Err(SyncError::Timeout(_)) => "timeout",
    }
}

/// Initialize the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<(), OtelError> {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    match config.format.to_lowercase().as_str() {
        "pretty" | "text" => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .map_err(|e| OtelError::LoggingInit(e.to_string()))
}
