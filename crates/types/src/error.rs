// crates/types/src/error.rs
//! Error taxonomy shared across the workspace.
//!
//! Every error carries structured context (path, SQL text, repo path)
//! and a stable classification tag via `error_type()`, used as the
//! `error.type` attribute on failure counters.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading Cursor's SQLite databases.
#[derive(Debug, Error)]
pub enum CursorDbError {
    #[error("Cursor database not found: {path}")]
    DatabaseNotFound { path: PathBuf },

    #[error("Cannot access Cursor database {path}: {cause}")]
    DatabaseAccess {
        path: PathBuf,
        cause: String,
        retriable: bool,
    },

    #[error("Query failed against Cursor database: {cause} (sql: {sql})")]
    DatabaseQuery {
        sql: String,
        parameters: String,
        cause: String,
    },

    #[error("Malformed JSON under key {key}: {cause}")]
    MalformedData { key: String, cause: String },
}

impl CursorDbError {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::DatabaseNotFound { .. } => "database_not_found",
            Self::DatabaseAccess { .. } => "database_access",
            Self::DatabaseQuery { .. } => "database_query",
            Self::MalformedData { .. } => "malformed_data",
        }
    }

    /// Structured context for telemetry. Values are raw; sanitize before
    /// attaching to span attributes.
    pub fn context(&self) -> BTreeMap<&'static str, String> {
        let mut ctx = BTreeMap::new();
        match self {
            Self::DatabaseNotFound { path } => {
                ctx.insert("path", path.display().to_string());
            }
            Self::DatabaseAccess {
                path,
                cause,
                retriable,
            } => {
                ctx.insert("path", path.display().to_string());
                ctx.insert("cause", cause.clone());
                ctx.insert("retriable", retriable.to_string());
            }
            Self::DatabaseQuery {
                sql,
                parameters,
                cause,
            } => {
                ctx.insert("sql", sql.clone());
                ctx.insert("parameters", parameters.clone());
                ctx.insert("cause", cause.clone());
            }
            Self::MalformedData { key, cause } => {
                ctx.insert("key", key.clone());
                ctx.insert("cause", cause.clone());
            }
        }
        ctx
    }
}

/// Raised when no workspace database can be matched to a repository and
/// no most-recent fallback exists.
#[derive(Debug, Error)]
#[error(
    "No Cursor workspace matched repository {repo_path} \
     ({candidates_scanned} candidates scanned, fallback_attempted: {fallback_attempted})"
)]
pub struct WorkspaceDetectionError {
    pub repo_path: PathBuf,
    pub candidates_scanned: usize,
    pub fallback_attempted: bool,
}

impl WorkspaceDetectionError {
    pub fn error_type(&self) -> &'static str {
        "workspace_detection"
    }

    pub fn context(&self) -> BTreeMap<&'static str, String> {
        let mut ctx = BTreeMap::new();
        ctx.insert("repo_path", self.repo_path.display().to_string());
        ctx.insert("candidates_scanned", self.candidates_scanned.to_string());
        ctx.insert("fallback_attempted", self.fallback_attempted.to_string());
        ctx
    }
}

/// Errors raised by the signal store.
///
/// Directory and file variants carry a `graceful_degradation` flag: when
/// true, the caller is expected to log and continue rather than abort.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Signal directory error: {message}")]
    Directory {
        message: String,
        graceful_degradation: bool,
    },

    #[error("Signal file error: {message}")]
    File {
        message: String,
        graceful_degradation: bool,
    },

    #[error("Signal validation failed: {reason}")]
    Validation {
        field: Option<String>,
        reason: String,
    },
}

impl SignalError {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Directory { .. } => "signal_directory",
            Self::File { .. } => "signal_file",
            Self::Validation { .. } => "signal_validation",
        }
    }

    /// Whether the failure should be absorbed rather than propagated.
    pub fn is_graceful(&self) -> bool {
        match self {
            Self::Directory {
                graceful_degradation,
                ..
            }
            | Self::File {
                graceful_degradation,
                ..
            } => *graceful_degradation,
            Self::Validation { .. } => false,
        }
    }

    pub fn context(&self) -> BTreeMap<&'static str, String> {
        let mut ctx = BTreeMap::new();
        match self {
            Self::Directory {
                message,
                graceful_degradation,
            }
            | Self::File {
                message,
                graceful_degradation,
            } => {
                ctx.insert("message", message.clone());
                ctx.insert("graceful_degradation", graceful_degradation.to_string());
            }
            Self::Validation { field, reason } => {
                if let Some(field) = field {
                    ctx.insert("field", field.clone());
                }
                ctx.insert("reason", reason.clone());
            }
        }
        ctx
    }
}

/// Errors raised while resolving or applying telemetry configuration.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid telemetry setting {config_path}: {reason}")]
    Validation { config_path: String, reason: String },

    #[error("Failed to configure {exporter_name} exporter: {cause}")]
    Exporter {
        exporter_name: String,
        cause: String,
    },
}

impl TelemetryError {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "telemetry_validation",
            Self::Exporter { .. } => "exporter_configuration",
        }
    }

    pub fn context(&self) -> BTreeMap<&'static str, String> {
        let mut ctx = BTreeMap::new();
        match self {
            Self::Validation {
                config_path,
                reason,
            } => {
                ctx.insert("config_path", config_path.clone());
                ctx.insert("reason", reason.clone());
            }
            Self::Exporter {
                exporter_name,
                cause,
            } => {
                ctx.insert("exporter_name", exporter_name.clone());
                ctx.insert("cause", cause.clone());
            }
        }
        ctx
    }
}
