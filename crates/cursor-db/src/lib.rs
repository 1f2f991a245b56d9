// crates/cursor-db/src/lib.rs
//! Read-only extraction of chat history from Cursor's per-workspace
//! SQLite databases.
//!
//! The pipeline: locate the platform's `workspaceStorage` roots
//! ([`platform`]), fuzzy-match the git repository to the right
//! workspace database ([`workspace`]), query session metadata and
//! message bubbles for a commit's time window ([`composer`]), and
//! aggregate across every recently-modified database with
//! partial-success semantics ([`aggregator`]).
//!
//! Cursor's databases are never written, never repaired, and opened
//! only for the duration of a single query.

pub mod aggregator;
pub mod circuit;
pub mod composer;
pub mod platform;
pub mod query;
pub mod workspace;

pub use aggregator::{ChatExtractor, DEFAULT_LOOKBACK_HOURS};
pub use circuit::CircuitBreaker;
pub use composer::chat_for_window;
pub use platform::{global_storage_db, workspace_storage_roots, WORKSPACE_DB_NAME};
pub use query::execute_query;
pub use workspace::{detect_workspace, enumerate_candidates, WorkspaceCandidate};
