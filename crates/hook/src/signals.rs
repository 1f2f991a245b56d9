// crates/hook/src/signals.rs
//! Signal store: minimal JSON hand-off documents for the external AI
//! client.
//!
//! Signals carry exactly `{tool, params, created_at}` and nothing else
//! — no author, no file paths, no message text. Downstream consumers
//! re-derive anything they need from the commit hash alone
//! (`fetch_git_context_on_demand`). Cleanup is safety-gated: only a
//! path ending in the blessed directory suffix is ever emptied.

use chrono::Utc;
use commit_story_core::git::GitError;
use commit_story_types::{GitContext, SignalError};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Directory the system owns inside a repository.
pub const STORY_DIR: &str = ".mcp-commit-story";
/// Signal directory name under [`STORY_DIR`].
pub const SIGNALS_DIR: &str = "signals";

/// The signal store. The creation lock serialises file creation so
/// filenames stay unique and each write lands whole; the processed set
/// tracks which signals this process has already handled.
pub struct SignalStore {
    creation_lock: Mutex<()>,
    processed: Mutex<HashSet<PathBuf>>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self {
            creation_lock: Mutex::new(()),
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Create `<repo>/.mcp-commit-story/signals/`, returning its
    /// absolute path. Idempotent.
    pub fn ensure_directory(repo: &Path) -> Result<PathBuf, SignalError> {
        if !repo.exists() {
            return Err(SignalError::Directory {
                message: format!("invalid repository path: {}", repo.display()),
                graceful_degradation: true,
            });
        }

        let signal_dir = repo.join(STORY_DIR).join(SIGNALS_DIR);
        fs::create_dir_all(&signal_dir).map_err(|e| SignalError::Directory {
            message: format!("cannot create {}: {e}", signal_dir.display()),
            graceful_degradation: true,
        })?;

        signal_dir.canonicalize().map_err(|e| SignalError::Directory {
            message: format!("cannot resolve {}: {e}", signal_dir.display()),
            graceful_degradation: true,
        })
    }

    /// Write one signal file and return its path.
    ///
    /// The filename is `<YYYYMMDD_HHMMSS_ffffff>_<tool>_<hash8>.json`;
    /// a same-microsecond collision appends a `_NNNN` counter, so
    /// filename sort order is creation order. `commit_hash` is folded
    /// into `params`; nothing else from the commit is stored.
    pub fn create(
        &self,
        signal_dir: &Path,
        tool: &str,
        params: Map<String, Value>,
        commit_hash: &str,
    ) -> Result<PathBuf, SignalError> {
        if tool.is_empty() {
            return Err(SignalError::Validation {
                field: Some("tool".to_string()),
                reason: "tool name must be a non-empty string".to_string(),
            });
        }
        if commit_hash.is_empty() {
            return Err(SignalError::File {
                message: "commit metadata must carry a hash".to_string(),
                graceful_degradation: true,
            });
        }

        let _guard = self.creation_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let timestamp = now.format("%Y%m%d_%H%M%S_%6f").to_string();
        let hash8: String = commit_hash.chars().take(8).collect();
        let file_path = unique_signal_path(signal_dir, &timestamp, tool, &hash8);

        let mut minimal_params = params;
        minimal_params.insert(
            "commit_hash".to_string(),
            Value::String(commit_hash.to_string()),
        );

        // serde_json::Map keeps keys sorted, so the document is
        // reproducible and the single write is whole from a reader's
        // point of view.
        let mut doc = Map::new();
        doc.insert("tool".to_string(), Value::String(tool.to_string()));
        doc.insert("params".to_string(), Value::Object(minimal_params));
        doc.insert("created_at".to_string(), Value::String(now.to_rfc3339()));

        let body = serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| {
            SignalError::File {
                message: format!("signal serialization failed: {e}"),
                graceful_degradation: true,
            }
        })?;

        fs::write(&file_path, body).map_err(|e| SignalError::File {
            message: format!("cannot write {}: {e}", file_path.display()),
            graceful_degradation: true,
        })?;

        debug!("created signal {}", file_path.display());
        Ok(file_path)
    }

    /// Validate a signal document: exactly the three top-level fields,
    /// each of the right type, none empty.
    pub fn validate(doc: &Value) -> Result<(), SignalError> {
        let Some(object) = doc.as_object() else {
            return Err(SignalError::Validation {
                field: None,
                reason: "signal must be a JSON object".to_string(),
            });
        };

        for key in object.keys() {
            if !matches!(key.as_str(), "tool" | "params" | "created_at") {
                return Err(SignalError::Validation {
                    field: Some(key.clone()),
                    reason: "unexpected top-level field".to_string(),
                });
            }
        }

        match object.get("tool") {
            Some(Value::String(tool)) if !tool.is_empty() => {}
            _ => {
                return Err(SignalError::Validation {
                    field: Some("tool".to_string()),
                    reason: "must be a non-empty string".to_string(),
                })
            }
        }
        match object.get("params") {
            Some(Value::Object(_)) => {}
            _ => {
                return Err(SignalError::Validation {
                    field: Some("params".to_string()),
                    reason: "must be an object".to_string(),
                })
            }
        }
        match object.get("created_at") {
            Some(Value::String(created)) if !created.is_empty() => {}
            _ => {
                return Err(SignalError::Validation {
                    field: Some("created_at".to_string()),
                    reason: "must be a non-empty string".to_string(),
                })
            }
        }

        Ok(())
    }

    /// Clear all stale signals ahead of a new commit's work. Returns
    /// how many were removed. The deletion only proceeds after the
    /// path-identity check.
    pub fn cleanup_for_new_commit(repo: &Path) -> Result<usize, SignalError> {
        let signal_dir = Self::ensure_directory(repo)?;
        Self::clear_directory(&signal_dir)
    }

    fn clear_directory(signal_dir: &Path) -> Result<usize, SignalError> {
        if !is_blessed_signal_dir(signal_dir) {
            return Err(SignalError::Directory {
                message: format!(
                    "refusing to clean {}: not a {STORY_DIR}/{SIGNALS_DIR} directory",
                    signal_dir.display()
                ),
                graceful_degradation: true,
            });
        }
        if !signal_dir.is_dir() {
            return Ok(0);
        }

        let entries = fs::read_dir(signal_dir).map_err(|e| SignalError::Directory {
            message: format!("cannot read {}: {e}", signal_dir.display()),
            graceful_degradation: true,
        })?;

        let mut cleared = 0usize;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() {
                match fs::remove_file(&path) {
                    Ok(()) => cleared += 1,
                    Err(e) => warn!("could not remove signal {}: {e}", path.display()),
                }
            }
        }
        debug!("cleared {cleared} stale signals from {}", signal_dir.display());
        Ok(cleared)
    }

    /// Remember that this process handled a signal.
    pub fn mark_processed(&self, path: &Path) {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    /// Delete only the signals this process marked processed. Returns
    /// `(processed_removed, unprocessed_preserved)`.
    pub fn remove_processed(&self, signal_dir: &Path) -> Result<(usize, usize), SignalError> {
        if !is_blessed_signal_dir(signal_dir) {
            return Err(SignalError::Directory {
                message: format!(
                    "refusing to clean {}: not a {STORY_DIR}/{SIGNALS_DIR} directory",
                    signal_dir.display()
                ),
                graceful_degradation: true,
            });
        }

        let mut processed = self.processed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0usize;
        let mut preserved = 0usize;

        let entries = fs::read_dir(signal_dir).map_err(|e| SignalError::Directory {
            message: format!("cannot read {}: {e}", signal_dir.display()),
            graceful_degradation: true,
        })?;

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if processed.contains(&path) {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        processed.remove(&path);
                        removed += 1;
                    }
                    Err(e) => warn!("could not remove signal {}: {e}", path.display()),
                }
            } else {
                preserved += 1;
            }
        }

        Ok((removed, preserved))
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick a filename that cannot clash with an existing signal: the
/// microsecond timestamp is usually enough, and a same-microsecond
/// collision gets a `_NNNN` counter that preserves sort order.
fn unique_signal_path(signal_dir: &Path, timestamp: &str, tool: &str, hash8: &str) -> PathBuf {
    let mut path = signal_dir.join(format!("{timestamp}_{tool}_{hash8}.json"));
    let mut counter = 0u32;
    while path.exists() {
        counter += 1;
        path = signal_dir.join(format!("{timestamp}_{tool}_{hash8}_{counter:04}.json"));
    }
    path
}

/// The path-identity safety gate for every deletion.
fn is_blessed_signal_dir(dir: &Path) -> bool {
    let mut components = dir.components().rev();
    let last = components.next().map(|c| c.as_os_str() == SIGNALS_DIR);
    let parent = components.next().map(|c| c.as_os_str() == STORY_DIR);
    last == Some(true) && parent == Some(true)
}

/// Rebuild the git context for a signal using only the hash it stores.
pub async fn fetch_git_context_on_demand(
    commit_hash: &str,
    repo: &Path,
) -> Result<GitContext, GitError> {
    commit_story_core::git::collect_git_context(repo, commit_hash).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn params(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let repo = TempDir::new().unwrap();
        let first = SignalStore::ensure_directory(repo.path()).unwrap();
        let second = SignalStore::ensure_directory(repo.path()).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with(".mcp-commit-story/signals"));
        assert!(first.is_dir());
    }

    #[test]
    fn test_ensure_directory_rejects_missing_repo() {
        let err = SignalStore::ensure_directory(Path::new("/no/such/repo")).unwrap_err();
        assert!(err.is_graceful());
    }

    #[test]
    fn test_create_writes_minimal_valid_signal() {
        let repo = TempDir::new().unwrap();
        let dir = SignalStore::ensure_directory(repo.path()).unwrap();
        let store = SignalStore::new();

        let path = store
            .create(&dir, "generate_journal_entry", Map::new(), "abcdef1234567890")
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.contains("generate_journal_entry"));
        assert!(name.contains("abcdef12"));
        assert!(name.ends_with(".json"));

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        SignalStore::validate(&doc).unwrap();
        assert_eq!(doc["params"]["commit_hash"], "abcdef1234567890");
    }

    #[test]
    fn test_create_contains_no_pii() {
        // Caller passes rich metadata; only the hash may survive.
        let repo = TempDir::new().unwrap();
        let dir = SignalStore::ensure_directory(repo.path()).unwrap();
        let store = SignalStore::new();

        let path = store
            .create(
                &dir,
                "generate_journal_entry",
                params(&[("date", "2025-01-05")]),
                "deadbeefcafe0123",
            )
            .unwrap();

        let body = fs::read_to_string(&path).unwrap();
        let doc: Value = serde_json::from_str(&body).unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["created_at", "params", "tool"]);
        assert!(!body.contains('@'), "no email-shaped strings: {body}");
        assert!(!body.contains("/home"), "no path-shaped strings: {body}");
    }

    #[test]
    fn test_same_microsecond_collision_gets_counter_suffix() {
        let dir = TempDir::new().unwrap();
        let ts = "20250106_101530_123456";

        let first = unique_signal_path(dir.path(), ts, "generate_journal_entry", "abc123de");
        fs::write(&first, "{}").unwrap();

        let second = unique_signal_path(dir.path(), ts, "generate_journal_entry", "abc123de");
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_0001.json"));
        fs::write(&second, "{}").unwrap();

        let third = unique_signal_path(dir.path(), ts, "generate_journal_entry", "abc123de");
        assert!(third
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_0002.json"));
        // The counter preserves name-sort creation order.
        assert!(first < second && second < third);
    }

    #[test]
    fn test_filenames_sort_in_creation_order() {
        let repo = TempDir::new().unwrap();
        let dir = SignalStore::ensure_directory(repo.path()).unwrap();
        let store = SignalStore::new();

        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(
                store
                    .create(&dir, "generate_journal_entry", Map::new(), "abc123def456")
                    .unwrap(),
            );
        }
        let mut sorted = created.clone();
        sorted.sort();
        assert_eq!(created, sorted, "timestamp prefix keeps creation order");
    }

    #[test]
    fn test_validate_rejects_extra_and_missing_fields() {
        let extra = serde_json::json!({
            "tool": "x", "params": {}, "created_at": "t", "author": "jane"
        });
        let err = SignalStore::validate(&extra).unwrap_err();
        match err {
            SignalError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("author")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let missing = serde_json::json!({"tool": "x", "params": {}});
        assert!(SignalStore::validate(&missing).is_err());

        let empty_tool = serde_json::json!({"tool": "", "params": {}, "created_at": "t"});
        assert!(SignalStore::validate(&empty_tool).is_err());

        let wrong_type = serde_json::json!({"tool": "x", "params": [], "created_at": "t"});
        assert!(SignalStore::validate(&wrong_type).is_err());
    }

    #[test]
    fn test_cleanup_clears_only_signal_files() {
        let repo = TempDir::new().unwrap();
        let dir = SignalStore::ensure_directory(repo.path()).unwrap();
        let store = SignalStore::new();
        store
            .create(&dir, "generate_journal_entry", Map::new(), "abc123def456")
            .unwrap();
        store
            .create(&dir, "generate_daily_summary", Map::new(), "abc123def456")
            .unwrap();
        // A file outside the signals directory must survive.
        let outside = repo.path().join("untouched.txt");
        fs::write(&outside, "keep me").unwrap();

        let cleared = SignalStore::cleanup_for_new_commit(repo.path()).unwrap();
        assert_eq!(cleared, 2);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        assert!(outside.exists());
    }

    #[test]
    fn test_cleanup_refuses_unblessed_directory() {
        let dir = TempDir::new().unwrap();
        let err = SignalStore::clear_directory(dir.path()).unwrap_err();
        assert!(err.to_string().contains("refusing"));
    }

    #[test]
    fn test_processed_set_round_trip() {
        let repo = TempDir::new().unwrap();
        let dir = SignalStore::ensure_directory(repo.path()).unwrap();
        let store = SignalStore::new();

        let processed = store
            .create(&dir, "generate_journal_entry", Map::new(), "abc123def456")
            .unwrap();
        let unprocessed = store
            .create(&dir, "generate_daily_summary", Map::new(), "abc123def456")
            .unwrap();

        assert!(!store.is_processed(&processed));
        store.mark_processed(&processed);
        assert!(store.is_processed(&processed));

        let (removed, preserved) = store.remove_processed(&dir).unwrap();
        assert_eq!((removed, preserved), (1, 1));
        assert!(!processed.exists());
        assert!(unprocessed.exists());
    }

    #[test]
    fn test_blessed_dir_gate() {
        assert!(is_blessed_signal_dir(Path::new(
            "/repo/.mcp-commit-story/signals"
        )));
        assert!(!is_blessed_signal_dir(Path::new("/repo/signals")));
        assert!(!is_blessed_signal_dir(Path::new(
            "/repo/.mcp-commit-story/other"
        )));
        assert!(!is_blessed_signal_dir(Path::new("/")));
    }

    #[tokio::test]
    async fn test_fetch_git_context_on_demand_errors_outside_repo() {
        let dir = TempDir::new().unwrap();
        let result = fetch_git_context_on_demand("abc123", dir.path()).await;
        assert!(result.is_err());
    }
}
