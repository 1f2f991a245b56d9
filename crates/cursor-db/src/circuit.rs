// crates/cursor-db/src/circuit.rs
//! Circuit breaker for multi-database extraction.
//!
//! Tracks consecutive database failures within the process. When the
//! threshold trips, extraction short-circuits to an empty result until
//! an explicit reset. Owned by the aggregator, never module-global.

use std::sync::{Mutex, PoisonError};

/// Consecutive failures before the circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

#[derive(Debug)]
struct State {
    consecutive_failures: u32,
    open: bool,
}

/// A small consecutive-failure breaker with explicit reset.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            state: Mutex::new(State {
                consecutive_failures: 0,
                open: false,
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).open
    }

    /// Record one database failure; returns true if the circuit is now
    /// open.
    pub fn record_failure(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.open = true;
        }
        state.open
    }

    /// Any success closes the consecutive-failure window (but does not
    /// reopen a tripped circuit — that requires `reset`).
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.open {
            state.consecutive_failures = 0;
        }
    }

    /// Explicit reset, used by tests and by operators after fixing the
    /// underlying database problem.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures = 0;
        state.open = false;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}
