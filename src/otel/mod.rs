//! OpenTelemetry integration for scope-watch
//!
//! This module provides observability through OpenTelemetry, including
//! tracing and pipeline metrics, with optional export to an OTLP endpoint.

use crate::config::{LoggingConfig, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// OpenTelemetry provider for scope-watch
///
/// Manages tracing and metrics providers with OTLP export capability.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    /// Create a new OtelProvider with the given configuration
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;

            let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;
            let meter_provider = Self::init_meter_provider(endpoint, &resource)?;

            (Some(tracer_provider), meter_provider)
        } else {
            // No reader: instruments record into a no-op pipeline
            let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
            (None, meter_provider)
        };

        if let Some(ref tp) = tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            config: config.clone(),
        })
    }

    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        let trace_config = Config::default()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone());

        Ok(TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build())
    }

    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
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
            .with_resource(resource.clone())
            .with_reader(reader)
            .build())
    }

    /// Get a tracer from the provider
    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        if let Some(ref tp) = self.tracer_provider {
            tp.tracer(name)
        } else {
            TracerProvider::builder().build().tracer(name)
        }
    }

    /// Get the meter for creating metrics
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    /// Check if OpenTelemetry is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Shutdown the OpenTelemetry providers gracefully
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Err(e) = self.meter_provider.shutdown() {
            return Err(OtelError::Shutdown(format!(
                "Meter shutdown failed: {:?}",
                e
            )));
        }

        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                if let Err(e) = result {
                    return Err(OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Pipeline metrics for scope-watch
pub struct Metrics {
    /// Watcher cycles, by watcher and outcome
    pub cycles_total: Counter<u64>,

    /// Unique items collected per cycle
    pub items_collected: Histogram<u64>,

    /// Items added or removed, by watcher and kind
    pub changes_total: Counter<u64>,

    /// Notification deliveries, by outcome
    pub deliveries_total: Counter<u64>,

    /// Cycle duration in seconds
    pub cycle_duration: Histogram<f64>,
}

impl Metrics {
    /// Create new metrics with the given meter
    pub fn new(meter: &Meter) -> Self {
        let cycles_total = meter
            .u64_counter("scope_watch_cycles_total")
            .with_description("Total number of watcher cycles")
            .init();

        let items_collected = meter
            .u64_histogram("scope_watch_items_collected")
            .with_description("Unique items collected per cycle")
            .init();

        let changes_total = meter
            .u64_counter("scope_watch_changes_total")
            .with_description("Total number of added or removed items")
            .init();

        let deliveries_total = meter
            .u64_counter("scope_watch_deliveries_total")
            .with_description("Total number of notification deliveries")
            .init();

        let cycle_duration = meter
            .f64_histogram("scope_watch_cycle_duration_seconds")
            .with_description("Watcher cycle duration in seconds")
            .init();

        Self {
            cycles_total,
            items_collected,
            changes_total,
            deliveries_total,
            cycle_duration,
        }
    }

    /// Record a finished cycle
    pub fn record_cycle(&self, watcher: &str, outcome: &str, duration_secs: f64) {
        self.cycles_total.add(
            1,
            &[
                KeyValue::new("watcher", watcher.to_string()),
                KeyValue::new("outcome", outcome.to_string()),
            ],
        );
        self.cycle_duration.record(
            duration_secs,
            &[KeyValue::new("watcher", watcher.to_string())],
        );
    }

    /// Record the size of a collected snapshot
    pub fn record_items_collected(&self, watcher: &str, items: usize) {
        self.items_collected.record(
            items as u64,
            &[KeyValue::new("watcher", watcher.to_string())],
        );
    }

    /// Record the size of a change set
    pub fn record_changes(&self, watcher: &str, added: usize, removed: usize) {
        for (kind, count) in [("added", added), ("removed", removed)] {
            if count > 0 {
                self.changes_total.add(
                    count as u64,
                    &[
                        KeyValue::new("watcher", watcher.to_string()),
                        KeyValue::new("kind", kind),
                    ],
                );
            }
        }
    }

    /// Record a delivery outcome ("delivered" or "dropped")
    pub fn record_delivery(&self, outcome: &str) {
        self.deliveries_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }
}

/// Parse a log level name, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize tracing subscriber with OpenTelemetry integration
///
/// `RUST_LOG` overrides the configured level when set. `logging.format`
/// selects JSON (default) or human-readable output.
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let level = parse_level(&logging.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let fmt_layer = match logging.format.to_lowercase().as_str() {
        "pretty" => tracing_subscriber::fmt::layer().pretty().boxed(),
        "compact" => tracing_subscriber::fmt::layer().compact().boxed(),
        _ => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let otel_layer = otel
        .is_enabled()
        .then(|| tracing_opentelemetry::layer().with_tracer(otel.tracer("scope-watch")));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}
