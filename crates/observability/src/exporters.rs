// crates/observability/src/exporters.rs
//! Multi-exporter setup with partial-success semantics.
//!
//! Each enabled exporter is configured independently: one exporter's
//! failure never prevents the others from coming up. The returned
//! `PartialSuccess` names every survivor and annotates every failure
//! (connection-like OTLP failures carry endpoint and timeout).

use crate::config::{OtlpExporterConfig, TelemetryConfig};
use commit_story_types::{FailureDetail, PartialSuccess};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

/// The providers produced by exporter configuration. Either may be
/// absent when no exporter of that signal kind survived.
pub struct TelemetryProviders {
    pub tracer_provider: Option<SdkTracerProvider>,
    pub meter_provider: Option<SdkMeterProvider>,
}

/// Configure all enabled exporters and build the providers.
pub fn configure_exporters(
    config: &TelemetryConfig,
) -> (TelemetryProviders, PartialSuccess<String>) {
    let mut successful: Vec<String> = Vec::new();
    let mut failed: BTreeMap<String, FailureDetail> = BTreeMap::new();

    let resource = build_resource(config);
    let mut tracer_builder = SdkTracerProvider::builder().with_resource(resource.clone());
    let mut meter_builder = SdkMeterProvider::builder().with_resource(resource);
    let mut trace_exporters = 0usize;
    let mut metric_readers = 0usize;

    // Console — infallible, writes to stdout.
    let console = &config.exporters.console;
    if console.enabled {
        if console.traces {
            tracer_builder =
                tracer_builder.with_batch_exporter(opentelemetry_stdout::SpanExporter::default());
            trace_exporters += 1;
        }
        if console.metrics {
            let reader =
                PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();
            meter_builder = meter_builder.with_reader(reader);
            metric_readers += 1;
        }
        successful.push("console".to_string());
        info!("console exporter configured");
    }

    // OTLP — span and metric exporters over grpc or http.
    let otlp = &config.exporters.otlp;
    if otlp.enabled {
        match configure_otlp(otlp) {
            Ok((span_exporter, metric_exporter)) => {
                if let Some(exporter) = span_exporter {
                    tracer_builder = tracer_builder.with_batch_exporter(exporter);
                    trace_exporters += 1;
                }
                if let Some(exporter) = metric_exporter {
                    meter_builder = meter_builder.with_reader(
                        PeriodicReader::builder(exporter).build(),
                    );
                    metric_readers += 1;
                }
                successful.push("otlp".to_string());
                info!(
                    endpoint = %otlp.endpoint,
                    protocol = %otlp.protocol,
                    "OTLP exporter configured"
                );
            }
            Err(cause) => {
                warn!("OTLP exporter configuration failed: {cause}");
                failed.insert(
                    "otlp".to_string(),
                    FailureDetail {
                        error: cause.clone(),
                        details: format!(
                            "Failed to connect to {} after {} seconds: {cause}",
                            otlp.endpoint, otlp.timeout
                        ),
                    },
                );
            }
        }
    }

    // Prometheus — metrics only, via the built-in HTTP listener.
    let prometheus = &config.exporters.prometheus;
    if prometheus.enabled && prometheus.metrics {
        let addr = SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            prometheus.port as u16,
        );
        match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => {
                successful.push("prometheus".to_string());
                info!(
                    port = prometheus.port,
                    endpoint = %prometheus.endpoint,
                    "Prometheus exporter listening"
                );
            }
            Err(e) => {
                warn!("Prometheus exporter configuration failed: {e}");
                failed.insert(
                    "prometheus".to_string(),
                    FailureDetail {
                        error: e.to_string(),
                        details: format!(
                            "Failed to start Prometheus listener on port {}",
                            prometheus.port
                        ),
                    },
                );
            }
        }
    }

    let providers = TelemetryProviders {
        tracer_provider: (trace_exporters > 0).then(|| tracer_builder.build()),
        meter_provider: (metric_readers > 0).then(|| meter_builder.build()),
    };

    (providers, PartialSuccess::from_parts(successful, failed))
}

fn build_resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new(
                "deployment.environment",
                config.deployment_environment.clone(),
            ),
        ])
        .build()
}

type OtlpExporters = (
    Option<opentelemetry_otlp::SpanExporter>,
    Option<opentelemetry_otlp::MetricExporter>,
);

fn configure_otlp(otlp: &OtlpExporterConfig) -> Result<OtlpExporters, String> {
    if !otlp.endpoint.starts_with("http://") && !otlp.endpoint.starts_with("https://") {
        return Err(format!("invalid OTLP endpoint: {}", otlp.endpoint));
    }
    let timeout = Duration::from_secs(otlp.timeout);

    let span_exporter = if otlp.traces {
        Some(build_otlp_span_exporter(otlp, timeout)?)
    } else {
        None
    };
    let metric_exporter = if otlp.metrics {
        Some(build_otlp_metric_exporter(otlp, timeout)?)
    } else {
        None
    };
    Ok((span_exporter, metric_exporter))
}

// Headers are applied on the http protocol; the validated grpc path
// carries endpoint and timeout only.
fn build_otlp_span_exporter(
    otlp: &OtlpExporterConfig,
    timeout: Duration,
) -> Result<opentelemetry_otlp::SpanExporter, String> {
    let result = match otlp.protocol.as_str() {
        "grpc" => opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otlp.endpoint.clone())
            .with_timeout(timeout)
            .build(),
        _ => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(otlp.endpoint.clone())
            .with_timeout(timeout)
            .with_headers(otlp.headers.clone().into_iter().collect())
            .build(),
    };
    result.map_err(|e| e.to_string())
}

fn build_otlp_metric_exporter(
    otlp: &OtlpExporterConfig,
    timeout: Duration,
) -> Result<opentelemetry_otlp::MetricExporter, String> {
    let result = match otlp.protocol.as_str() {
        "grpc" => opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(otlp.endpoint.clone())
            .with_timeout(timeout)
            .build(),
        _ => opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_endpoint(otlp.endpoint.clone())
            .with_timeout(timeout)
            .with_headers(otlp.headers.clone().into_iter().collect())
            .build(),
    };
    result.map_err(|e| e.to_string())
}
