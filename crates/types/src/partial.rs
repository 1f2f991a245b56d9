// crates/types/src/partial.rs
//! `PartialSuccess` — the standard return shape of any operation that
//! fans out over independent items and must not fail as a whole.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall outcome of a fan-out operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialStatus {
    Success,
    PartialSuccess,
    Failure,
}

/// Why a single item of a fan-out failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Short error string (the error's display form).
    pub error: String,
    /// Longer human-readable detail, e.g. endpoint and timeout for
    /// connection failures.
    pub details: String,
}

/// Aggregate result of a fan-out operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSuccess<T = String> {
    pub status: PartialStatus,
    pub successful: Vec<T>,
    pub failed: BTreeMap<String, FailureDetail>,
}

impl<T> PartialSuccess<T> {
    /// Build from collected parts, deriving the status: all-ok →
    /// `Success`, mixed → `PartialSuccess`, all-failed (with at least
    /// one attempt) → `Failure`. No attempts at all counts as success.
    pub fn from_parts(successful: Vec<T>, failed: BTreeMap<String, FailureDetail>) -> Self {
        let status = match (successful.is_empty(), failed.is_empty()) {
            (_, true) => PartialStatus::Success,
            (false, false) => PartialStatus::PartialSuccess,
            (true, false) => PartialStatus::Failure,
        };
        Self {
            status,
            successful,
            failed,
        }
    }

    pub fn is_total_failure(&self) -> bool {
        self.status == PartialStatus::Failure
    }
}

impl<T> Default for PartialSuccess<T> {
    fn default() -> Self {
        Self {
            status: PartialStatus::Success,
            successful: Vec::new(),
            failed: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(msg: &str) -> FailureDetail {
        FailureDetail {
            error: msg.to_string(),
            details: msg.to_string(),
        }
    }

    #[test]
    fn test_all_successful_is_success() {
        let result =
            PartialSuccess::from_parts(vec!["console".to_string()], BTreeMap::new());
        assert_eq!(result.status, PartialStatus::Success);
    }

    #[test]
    fn test_mixed_is_partial_success() {
        let mut failed = BTreeMap::new();
        failed.insert("otlp".to_string(), failure("timeout"));
        let result = PartialSuccess::from_parts(vec!["console".to_string()], failed);
        assert_eq!(result.status, PartialStatus::PartialSuccess);
        assert!(!result.is_total_failure());
    }

    #[test]
    fn test_all_failed_is_failure() {
        let mut failed = BTreeMap::new();
        failed.insert("otlp".to_string(), failure("timeout"));
        let result: PartialSuccess = PartialSuccess::from_parts(vec![], failed);
        assert_eq!(result.status, PartialStatus::Failure);
        assert!(result.is_total_failure());
    }

    #[test]
    fn test_no_attempts_is_success() {
        let result: PartialSuccess = PartialSuccess::from_parts(vec![], BTreeMap::new());
        assert_eq!(result.status, PartialStatus::Success);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&PartialStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
    }
}
