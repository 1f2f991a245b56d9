// crates/observability/src/logging.rs
//! Structured logging bridge.
//!
//! Installs the process subscriber (env-filtered fmt output plus the
//! OpenTelemetry span layer when a tracer provider is active) and
//! exposes the trace/span-id enrichment used to correlate log records
//! with exported spans. Records emitted outside any span pass through
//! unchanged.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Instrumentation scope under which the bridge obtains its tracer.
const TRACER_SCOPE: &str = "commit-story";

/// Install the global subscriber: `RUST_LOG`-style filtering, compact
/// fmt output to stderr, and (when available) the OpenTelemetry layer
/// that exports spans through the configured providers.
///
/// Returns false when a subscriber was already installed (re-init is a
/// no-op, never a panic).
pub fn init_subscriber(tracer_provider: Option<&SdkTracerProvider>) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let otel_layer = tracer_provider
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_SCOPE)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .is_ok()
}

/// The active span's `(trace_id, span_id)`, when a sampled OTel span
/// is current.
pub fn current_trace_ids() -> Option<(String, String)> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    span_context
        .is_valid()
        .then(|| (span_context.trace_id().to_string(), span_context.span_id().to_string()))
}

/// Enrich a log message with the active trace/span ids. Outside a span
/// the message is returned unchanged.
pub fn with_trace_ids(message: &str) -> String {
    match current_trace_ids() {
        Some((trace_id, span_id)) => {
            format!("{message} trace_id={trace_id} span_id={span_id}")
        }
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_passes_through_without_active_span() {
        assert_eq!(with_trace_ids("plain record"), "plain record");
        assert!(current_trace_ids().is_none());
    }

    #[test]
    fn test_ids_attached_under_otel_span() {
        use tracing_subscriber::layer::SubscriberExt;

        // No processors needed — span contexts are valid either way.
        let provider = SdkTracerProvider::builder().build();
        let tracer = provider.tracer(TRACER_SCOPE);
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(tracer));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("enriched");
            let _enter = span.enter();
            let message = with_trace_ids("inside");
            assert!(message.contains("trace_id="), "got: {message}");
            assert!(message.contains("span_id="));
        });

        let _ = provider.shutdown();
    }
}
