// crates/observability/src/lib.rs
//! Telemetry core: tracer/meter providers, multi-exporter
//! configuration with partial success, uniform sync/async
//! instrumentation, sensitive-data redaction, and the structured
//! logging bridge.
//!
//! The provider handles are the only process-global mutable state in
//! the workspace. Initialisation is explicit and idempotent-by-
//! replacement: re-initialising cleanly shuts down the prior providers
//! first, and `shutdown_telemetry` flushes everything on exit.

pub mod config;
pub mod exporters;
pub mod instrument;
pub mod logging;
pub mod sanitize;

pub use config::{
    ConsoleExporterConfig, ExportersConfig, OtlpExporterConfig, PrometheusExporterConfig,
    TelemetryConfig,
};
pub use exporters::{configure_exporters, TelemetryProviders};
pub use instrument::{record_operation, record_operation_async};
pub use logging::{current_trace_ids, init_subscriber, with_trace_ids};
pub use sanitize::sanitize;

use commit_story_types::{PartialSuccess, TelemetryError};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

struct ActiveTelemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl ActiveTelemetry {
    fn shutdown(self) {
        if let Some(provider) = self.tracer_provider {
            if let Err(e) = provider.shutdown() {
                debug!("tracer provider shutdown: {e}");
            }
        }
        if let Some(provider) = self.meter_provider {
            if let Err(e) = provider.shutdown() {
                debug!("meter provider shutdown: {e}");
            }
        }
    }
}

static TELEMETRY: Mutex<Option<ActiveTelemetry>> = Mutex::new(None);

/// Initialise telemetry from a resolved configuration.
///
/// Validates first; a rejected setting is operation-fatal. With
/// `enabled: false` nothing is installed and the call reports success.
/// A prior initialisation is shut down before the new providers come
/// up, so calling this twice with the same config leaves the same
/// observable state.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<PartialSuccess<String>, TelemetryError> {
    config.validate()?;

    if !config.enabled {
        debug!("telemetry disabled by configuration");
        return Ok(PartialSuccess::default());
    }

    let mut slot = TELEMETRY.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(previous) = slot.take() {
        debug!("re-initialising telemetry: shutting down prior providers");
        previous.shutdown();
    }

    let (providers, result) = configure_exporters(config);

    if let Some(tracer_provider) = &providers.tracer_provider {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    }
    if let Some(meter_provider) = &providers.meter_provider {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
    }

    *slot = Some(ActiveTelemetry {
        tracer_provider: providers.tracer_provider,
        meter_provider: providers.meter_provider,
    });

    Ok(result)
}

/// Install the logging bridge wired to the active tracer provider (or
/// plain fmt output when telemetry is down). Returns false when a
/// subscriber was already installed.
pub fn init_logging_bridge() -> bool {
    let slot = TELEMETRY.lock().unwrap_or_else(PoisonError::into_inner);
    let tracer_provider = slot
        .as_ref()
        .and_then(|active| active.tracer_provider.as_ref());
    logging::init_subscriber(tracer_provider)
}

/// True while providers are installed.
pub fn is_initialised() -> bool {
    TELEMETRY.lock().unwrap_or_else(PoisonError::into_inner).is_some()
}

/// Flush and shut down the providers. Safe to call when telemetry was
/// never initialised, and safe to call twice.
pub fn shutdown_telemetry() {
    let taken = TELEMETRY.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(active) = taken {
        active.shutdown();
    }
}
