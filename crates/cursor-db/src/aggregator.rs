// crates/cursor-db/src/aggregator.rs
//! Multi-database aggregation with partial-success semantics.
//!
//! Every workspace database modified within the bounded look-back is
//! queried against its root's global database; a single failing
//! database never aborts the aggregate. Repeated failures trip a
//! circuit breaker that short-circuits later extractions until reset.

use crate::circuit::CircuitBreaker;
use crate::composer::chat_for_window;
use crate::platform::{global_storage_db, workspace_storage_roots};
use crate::workspace::{detect_workspace, enumerate_candidates, WorkspaceCandidate};
use commit_story_types::{
    ChatContext, ChatMessage, DataQuality, ErrorInfo, ExtractionStatus, TimeWindow,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// How far back a workspace database's mtime may lie and still be
/// queried.
pub const DEFAULT_LOOKBACK_HOURS: u64 = 48;

/// Aggregates chat extraction across all discovered Cursor databases.
pub struct ChatExtractor {
    extra_roots: Vec<PathBuf>,
    lookback: Duration,
    circuit: CircuitBreaker,
}

impl ChatExtractor {
    pub fn new() -> Self {
        Self {
            extra_roots: Vec::new(),
            lookback: Duration::from_secs(DEFAULT_LOOKBACK_HOURS * 3600),
            circuit: CircuitBreaker::default(),
        }
    }

    /// Add workspace-storage roots beyond the OS default (order kept).
    pub fn with_extra_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.extra_roots = roots;
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Explicit circuit reset, used by tests.
    pub fn reset_circuit_breaker(&self) {
        self.circuit.reset();
    }

    /// Extract the chat context for a commit's time window.
    ///
    /// Never fails: every degradation path returns an empty or partial
    /// `ChatContext` whose `data_quality` explains what happened.
    pub fn extract_chat_for_commit(&self, repo_path: &Path, window: &TimeWindow) -> ChatContext {
        if self.circuit.is_open() {
            debug!("circuit open, short-circuiting chat extraction");
            let mut quality = DataQuality::empty();
            quality.failure_reasons.push("circuit_open".to_string());
            return ChatContext {
                messages: Vec::new(),
                time_window: Some(*window),
                session_names: Vec::new(),
                data_quality: quality,
            };
        }

        let roots = workspace_storage_roots(&self.extra_roots);

        // Detection both selects the primary workspace and tells us
        // whether any candidate exists at all.
        if let Err(e) = detect_workspace(repo_path, &roots) {
            debug!("workspace detection failed: {e}");
            return ChatContext::empty_with_error(
                Some(*window),
                ErrorInfo {
                    error_type: e.error_type().to_string(),
                    message: e.to_string(),
                },
            );
        }

        let cutoff = SystemTime::now()
            .checked_sub(self.lookback)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut messages: Vec<ChatMessage> = Vec::new();
        let mut databases_found = 0usize;
        let mut databases_queried = 0usize;
        let mut databases_failed = 0usize;
        let mut failure_reasons: Vec<String> = Vec::new();

        for root in &roots {
            let global_db = global_storage_db(root);
            let candidates: Vec<WorkspaceCandidate> =
                enumerate_candidates(std::slice::from_ref(root))
                    .into_iter()
                    .filter(|c| c.last_modified >= cutoff)
                    .collect();

            for candidate in candidates {
                databases_found += 1;
                let Some(global_db) = global_db.as_deref() else {
                    databases_failed += 1;
                    failure_reasons
                        .push(format!("{}: no global database", candidate.database_path.display()));
                    self.circuit.record_failure();
                    continue;
                };

                match chat_for_window(&candidate.database_path, global_db, window) {
                    Ok(batch) => {
                        databases_queried += 1;
                        messages.extend(batch);
                        self.circuit.record_success();
                    }
                    Err(e) => {
                        databases_failed += 1;
                        warn!(
                            "chat extraction failed for {}: {e}",
                            candidate.database_path.display()
                        );
                        failure_reasons
                            .push(format!("{}: {e}", candidate.database_path.display()));
                        if self.circuit.record_failure() {
                            warn!("chat extraction circuit breaker tripped");
                        }
                    }
                }
            }
        }

        // Stable re-sort preserves each session's header order while
        // restoring the global (timestamp, composer_id) order across
        // database boundaries.
        messages.sort_by(|a, b| {
            (a.timestamp_ms, &a.composer_id).cmp(&(b.timestamp_ms, &b.composer_id))
        });

        let mut session_names: Vec<String> = Vec::new();
        for message in &messages {
            if !message.session_name.is_empty() && !session_names.contains(&message.session_name) {
                session_names.push(message.session_name.clone());
            }
        }

        let status = if databases_failed > 0 && databases_queried > 0 {
            ExtractionStatus::Partial
        } else if messages.is_empty() {
            ExtractionStatus::Empty
        } else {
            ExtractionStatus::Complete
        };

        let error_info = if databases_failed > 0 && databases_queried == 0 {
            Some(ErrorInfo {
                error_type: "multi_database_extraction".to_string(),
                message: failure_reasons.join("; "),
            })
        } else {
            None
        };

        tracing::info!(
            target: "commit_story::chat_for_commit",
            databases_discovered = databases_found,
            databases_queried,
            databases_failed,
            multi_database_mode = true,
            status = ?status,
            messages = messages.len(),
            "multi-database chat extraction finished"
        );

        ChatContext {
            messages,
            time_window: Some(*window),
            session_names,
            data_quality: DataQuality {
                databases_found,
                databases_queried,
                databases_failed,
                status,
                failure_reasons,
                error_info,
            },
        }
    }
}

impl Default for ChatExtractor {
    fn default() -> Self {
        Self::new()
    }
}
