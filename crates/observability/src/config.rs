// crates/observability/src/config.rs
//! Telemetry configuration: defaults, environment precedence, and
//! validation.
//!
//! Precedence, lowest to highest: built-in defaults, the loaded config
//! document (missing keys take defaults via serde), standard `OTEL_*`
//! variables, then `COMMIT_STORY_*` variables.

use commit_story_types::TelemetryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub service_name: String,
    pub service_version: String,
    pub deployment_environment: String,
    pub exporters: ExportersConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "commit-story".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            deployment_environment: "development".to_string(),
            exporters: ExportersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportersConfig {
    pub console: ConsoleExporterConfig,
    pub otlp: OtlpExporterConfig,
    pub prometheus: PrometheusExporterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleExporterConfig {
    pub enabled: bool,
    pub traces: bool,
    pub metrics: bool,
}

impl Default for ConsoleExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            traces: true,
            metrics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtlpExporterConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// `grpc` or `http`, exactly.
    pub protocol: String,
    pub headers: BTreeMap<String, String>,
    /// Export timeout in seconds; must be positive.
    pub timeout: u64,
    pub traces: bool,
    pub metrics: bool,
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:4317".to_string(),
            protocol: "grpc".to_string(),
            headers: BTreeMap::new(),
            timeout: 30,
            traces: true,
            metrics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusExporterConfig {
    pub enabled: bool,
    /// Kept wide so out-of-range values are rejected by validation
    /// instead of silently wrapped.
    pub port: u32,
    /// Scrape path; must start with `/`.
    pub endpoint: String,
    pub metrics: bool,
    /// Prometheus is metrics-only; validation rejects `true`.
    pub traces: bool,
}

impl Default for PrometheusExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8888,
            endpoint: "/metrics".to_string(),
            metrics: true,
            traces: false,
        }
    }
}

impl TelemetryConfig {
    /// Parse a loaded config document (its `telemetry` table); missing
    /// keys fall back to defaults.
    pub fn from_document(doc: &serde_json::Value) -> Result<Self, TelemetryError> {
        serde_json::from_value(doc.clone()).map_err(|e| TelemetryError::Validation {
            config_path: "telemetry".to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides from the process environment.
    pub fn resolve_env(&mut self) {
        self.resolve_env_with(&|name| std::env::var(name).ok());
    }

    /// Apply environment overrides via a lookup function (tests inject
    /// their own). Standard `OTEL_*` variables apply first, then the
    /// `COMMIT_STORY_*` variables which can override them. Unparseable
    /// values are warned about and skipped.
    pub fn resolve_env_with(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        // 1. Standard OTel variables (lower priority).
        if let Some(value) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.exporters.otlp.endpoint = value;
        }
        if let Some(value) = lookup("OTEL_EXPORTER_OTLP_HEADERS") {
            self.exporters.otlp.headers = parse_header_list(&value);
        }
        if let Some(value) = lookup("OTEL_EXPORTER_OTLP_TIMEOUT") {
            match value.parse::<u64>() {
                Ok(timeout) => self.exporters.otlp.timeout = timeout,
                Err(e) => warn!("ignoring OTEL_EXPORTER_OTLP_TIMEOUT={value}: {e}"),
            }
        }
        if let Some(value) = lookup("OTEL_SERVICE_NAME") {
            self.service_name = value;
        }

        // 2. System-specific variables (higher priority).
        if let Some(value) = lookup("COMMIT_STORY_PROMETHEUS_PORT") {
            match value.parse::<u32>() {
                Ok(port) => self.exporters.prometheus.port = port,
                Err(e) => warn!("ignoring COMMIT_STORY_PROMETHEUS_PORT={value}: {e}"),
            }
        }
        if let Some(value) = lookup("COMMIT_STORY_CONSOLE_ENABLED") {
            self.exporters.console.enabled = parse_bool(&value);
        }
        if let Some(value) = lookup("COMMIT_STORY_OTLP_ENDPOINT") {
            self.exporters.otlp.endpoint = value;
        }
        if let Some(value) = lookup("COMMIT_STORY_OTLP_ENABLED") {
            self.exporters.otlp.enabled = parse_bool(&value);
        }
        if let Some(value) = lookup("COMMIT_STORY_PROMETHEUS_ENABLED") {
            self.exporters.prometheus.enabled = parse_bool(&value);
        }
    }

    /// Validate the resolved configuration.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        let prometheus = &self.exporters.prometheus;
        if prometheus.port < 1 || prometheus.port > 65535 {
            return Err(TelemetryError::Validation {
                config_path: "telemetry.exporters.prometheus.port".to_string(),
                reason: "Port must be between 1 and 65535".to_string(),
            });
        }
        if !prometheus.endpoint.starts_with('/') {
            return Err(TelemetryError::Validation {
                config_path: "telemetry.exporters.prometheus.endpoint".to_string(),
                reason: "Endpoint must start with '/'".to_string(),
            });
        }
        if prometheus.traces {
            return Err(TelemetryError::Validation {
                config_path: "telemetry.exporters.prometheus.traces".to_string(),
                reason: "Prometheus exports metrics only".to_string(),
            });
        }

        let otlp = &self.exporters.otlp;
        if otlp.protocol != "grpc" && otlp.protocol != "http" {
            return Err(TelemetryError::Validation {
                config_path: "telemetry.exporters.otlp.protocol".to_string(),
                reason: "Protocol must be 'grpc' or 'http'".to_string(),
            });
        }
        if otlp.timeout == 0 {
            return Err(TelemetryError::Validation {
                config_path: "telemetry.exporters.otlp.timeout".to_string(),
                reason: "Timeout must be a positive integer".to_string(),
            });
        }
        if otlp.headers.keys().any(|k| k.trim().is_empty()) {
            return Err(TelemetryError::Validation {
                config_path: "telemetry.exporters.otlp.headers".to_string(),
                reason: "Headers must be valid key-value pairs".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse `k=v,k2=v2` header lists; entries without `=` are dropped.
fn parse_header_list(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
