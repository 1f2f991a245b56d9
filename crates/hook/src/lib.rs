// crates/hook/src/lib.rs
//! Post-commit hook, background worker, signal store, and the journal
//! orchestrator that ties context collection to section generation.
//!
//! The hook never blocks and never fails a commit; the worker runs
//! detached under a wall-clock timeout; the signal store is the only
//! place in the workspace that writes to the repository.

pub mod install;
pub mod orchestrator;
pub mod signals;
pub mod worker;

pub use install::{install_post_commit, InstallError};
pub use orchestrator::{Orchestrator, OrchestrationResult, OrchestrationTelemetry};
pub use signals::{fetch_git_context_on_demand, SignalStore, SIGNALS_DIR, STORY_DIR};
pub use worker::{run_worker, WorkerArgs, DEFAULT_WORKER_TIMEOUT_SECS};
