// crates/observability/src/instrument.rs
//! Uniform instrumentation for sync and async operations.
//!
//! One entry point, two paths: `record_operation` wraps a closure,
//! `record_operation_async` wraps a future and measures
//! suspension-inclusive duration. Both share the same guard, which
//! records a duration histogram and a success/failure counter, marks
//! the span errored on failure, and re-raises the error untouched.
//! Dropping the future mid-flight records the operation as dropped —
//! cancellation is never swallowed.

use metrics::{counter, histogram};
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tracing::Instrument;

const DURATION_HISTOGRAM: &str = "commit_story_operation_duration_seconds";
const OUTCOME_COUNTER: &str = "commit_story_operations_total";

struct OperationGuard {
    name: &'static str,
    start: Instant,
    finished: bool,
}

impl OperationGuard {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, outcome: &'static str) {
        self.finished = true;
        record_outcome(self.name, self.start.elapsed().as_secs_f64(), outcome);
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        // Reached only when the wrapped future was cancelled.
        if !self.finished {
            record_outcome(self.name, self.start.elapsed().as_secs_f64(), "dropped");
        }
    }
}

fn record_outcome(name: &'static str, elapsed_secs: f64, outcome: &'static str) {
    histogram!(DURATION_HISTOGRAM, "operation" => name).record(elapsed_secs);
    counter!(OUTCOME_COUNTER, "operation" => name, "outcome" => outcome).increment(1);
}

/// Run a synchronous operation inside a named span, recording duration
/// and outcome. Errors pass through unchanged.
pub fn record_operation<T, E: Display>(
    name: &'static str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let span = tracing::info_span!(
        "operation",
        otel.name = name,
        otel.status_code = tracing::field::Empty
    );
    let guard = OperationGuard::new(name);

    let result = span.in_scope(f);
    match &result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
            guard.finish("success");
        }
        Err(e) => {
            span.record("otel.status_code", "ERROR");
            tracing::warn!(parent: &span, operation = name, error = %e, "operation failed");
            guard.finish("failure");
        }
    }
    result
}

/// Run an asynchronous operation inside a named span. The await happens
/// inside the span scope, and the recorded duration includes time spent
/// suspended.
pub async fn record_operation_async<T, E, Fut>(name: &'static str, fut: Fut) -> Result<T, E>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    let span = tracing::info_span!(
        "operation",
        otel.name = name,
        otel.status_code = tracing::field::Empty
    );
    let guard = OperationGuard::new(name);

    let result = fut.instrument(span.clone()).await;
    match &result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
            guard.finish("success");
        }
        Err(e) => {
            span.record("otel.status_code", "ERROR");
            tracing::warn!(parent: &span, operation = name, error = %e, "operation failed");
            guard.finish("failure");
        }
    }
    result
}
