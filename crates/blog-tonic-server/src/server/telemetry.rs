//! Logging, tracing and metrics for the blog server.
//!
//! Console logging through `tracing_subscriber` is always installed. Two cargo
//! features add OpenTelemetry export over OTLP/gRPC to the collector at
//! `--otlp-endpoint`:
//!
//! - `otel`: spans from `#[tracing::instrument]` on every RPC and from the
//!   `streaming` span around each `ListBlog` feeder.
//! - `metrics`: the instruments behind the `increment_*`/`record_*` helpers
//!   below. Without the feature those helpers compile to nothing.
//!
//! Both exporters tag their data with the same resource: the service name and
//! version, the configured store and, for MongoDB, the database and collection
//! the blogs live in.
//!
//! ```bash
//! cargo run --bin blog-tonic-server --features otel,metrics -- \
//!     --otlp-endpoint http://collector:4317
//! ```

use crate::server::config::{ServerConfig, StoreKind};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(any(feature = "otel", feature = "metrics"))]
use anyhow::Context;
#[cfg(any(feature = "otel", feature = "metrics"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "otel", feature = "metrics"))]
use opentelemetry_otlp::WithExportConfig;
#[cfg(any(feature = "otel", feature = "metrics"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "otel", feature = "metrics"))]
use opentelemetry_semantic_conventions as semconv;

#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "otel", feature = "metrics"))]
const SERVICE_NAME: &str = "blog-tonic-server";
#[cfg(any(feature = "otel", feature = "metrics"))]
const EXPORT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Providers that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    tracer_provider: SdkTracerProvider,
    #[cfg(feature = "metrics")]
    meter_provider: SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes buffered spans and metrics, then shuts the exporters down.
    ///
    /// Failures are logged; there is nothing left to retry at this point.
    pub fn shutdown(self) {
        #[cfg(feature = "otel")]
        if let Err(e) = self
            .tracer_provider
            .force_flush()
            .and_then(|()| self.tracer_provider.shutdown())
        {
            tracing::warn!("Failed to flush spans: {e}");
        }

        #[cfg(feature = "metrics")]
        if let Err(e) = self
            .meter_provider
            .force_flush()
            .and_then(|()| self.meter_provider.shutdown())
        {
            tracing::warn!("Failed to flush metrics: {e}");
        }
    }
}

/// Installs the global subscriber and, when enabled, the OTLP exporters.
pub fn init_telemetry(config: &ServerConfig) -> anyhow::Result<TelemetryProviders> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(any(feature = "otel", feature = "metrics"))]
    let (resource, scope) = {
        let resource = Resource::builder()
            .with_service_name(SERVICE_NAME)
            .with_attributes(
                resource_attributes(config)
                    .into_iter()
                    .map(|(key, value)| KeyValue::new(key, value)),
            )
            .build();
        let scope = InstrumentationScope::builder(SERVICE_NAME)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semconv::SCHEMA_URL)
            .build();
        (resource, scope)
    };

    #[cfg(feature = "otel")]
    let (registry, tracer_provider) = {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(config.otlp_endpoint.clone())
            .with_timeout(EXPORT_TIMEOUT)
            .build()
            .context("failed to build OTLP span exporter")?;
        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(exporter)
            .build();

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        let layer = tracing_opentelemetry::layer()
            .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
            .with_error_records_to_exceptions(true);
        (registry.with(layer), tracer_provider)
    };

    #[cfg(feature = "metrics")]
    let meter_provider = {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(config.otlp_endpoint.clone())
            .with_timeout(EXPORT_TIMEOUT)
            .build()
            .context("failed to build OTLP metric exporter")?;
        let reader = PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(15))
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build();

        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let _ = METRICS.set(BlogMetrics::new(&opentelemetry::global::meter_with_scope(
            scope,
        )));
        meter_provider
    };

    registry.init();

    if cfg!(any(feature = "otel", feature = "metrics")) {
        tracing::info!("Exporting telemetry to {}", config.otlp_endpoint);
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Resource attributes describing this deployment.
///
/// The Mongo URI is left out since it may carry credentials.
#[cfg_attr(not(any(feature = "otel", feature = "metrics")), allow(dead_code))]
fn resource_attributes(config: &ServerConfig) -> Vec<(&'static str, String)> {
    let mut attrs = vec![
        ("service.version", env!("CARGO_PKG_VERSION").to_string()),
        ("blog.store", config.store.as_str().to_string()),
    ];
    if config.store == StoreKind::Mongo {
        attrs.push(("db.system.name", "mongodb".to_string()));
        attrs.push(("db.namespace", config.database.clone()));
        attrs.push(("db.collection.name", config.collection.clone()));
    }
    attrs
}

#[cfg(feature = "metrics")]
struct BlogMetrics {
    requests: Counter<u64>,
    request_errors: Counter<u64>,
    streams_inflight: UpDownCounter<i64>,
    stream_duration: Histogram<f64>,
    blogs_streamed: Counter<u64>,
}

#[cfg(feature = "metrics")]
static METRICS: OnceLock<BlogMetrics> = OnceLock::new();

#[cfg(feature = "metrics")]
impl BlogMetrics {
    fn new(meter: &opentelemetry::metrics::Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("requests")
                .with_description("gRPC requests received, by RPC")
                .build(),
            request_errors: meter
                .u64_counter("request_errors")
                .with_description("Failed requests and errored ListBlog streams, by RPC")
                .build(),
            streams_inflight: meter
                .i64_up_down_counter("streams_inflight")
                .with_description("ListBlog streams currently being fed")
                .build(),
            stream_duration: meter
                .f64_histogram("stream_duration")
                .with_unit("ms")
                .with_description("Time from ListBlog call to the last blog sent")
                .build(),
            blogs_streamed: meter
                .u64_counter("blogs_streamed")
                .with_description("Blogs sent over ListBlog streams")
                .build(),
        }
    }
}

#[cfg(feature = "metrics")]
fn record(f: impl FnOnce(&BlogMetrics)) {
    if let Some(metrics) = METRICS.get() {
        f(metrics);
    }
}

pub fn increment_requests(rpc: &'static str) {
    #[cfg(feature = "metrics")]
    record(|m| m.requests.add(1, &[KeyValue::new(semconv::attribute::RPC_METHOD, rpc)]));
    #[cfg(not(feature = "metrics"))]
    let _ = rpc;
}

pub fn increment_request_errors(rpc: &'static str) {
    #[cfg(feature = "metrics")]
    record(|m| m.request_errors.add(1, &[KeyValue::new(semconv::attribute::RPC_METHOD, rpc)]));
    #[cfg(not(feature = "metrics"))]
    let _ = rpc;
}

pub fn increment_streams_inflight() {
    #[cfg(feature = "metrics")]
    record(|m| m.streams_inflight.add(1, &[]));
}

pub fn decrement_streams_inflight() {
    #[cfg(feature = "metrics")]
    record(|m| m.streams_inflight.add(-1, &[]));
}

pub fn record_stream_duration(duration_ms: f64) {
    #[cfg(feature = "metrics")]
    record(|m| m.stream_duration.record(duration_ms, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = duration_ms;
}

pub fn increment_blogs_streamed() {
    #[cfg(feature = "metrics")]
    record(|m| m.blogs_streamed.add(1, &[]));
}
