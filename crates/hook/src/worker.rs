// crates/hook/src/worker.rs
//! Background worker: the detached process the post-commit hook
//! spawns.
//!
//! Runs under a wall-clock timeout. The sequence per commit: clear
//! stale signals, orchestrate the journal entry, append it to the
//! daily file, write the journal-entry signal, and — when a daily
//! boundary was crossed — write the daily-summary signal. No step is
//! allowed to propagate a failure; git never sees a non-zero exit.

use crate::orchestrator::Orchestrator;
use crate::signals::SignalStore;
use chrono::Utc;
use commit_story_core::daily_summary::should_generate_daily_summary;
use commit_story_core::journal_files::{append_entry, daily_entry_path};
use commit_story_core::llm::{ClaudeCliProvider, LlmProvider};
use commit_story_cursor_db::ChatExtractor;
use metrics::counter;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default wall-clock budget for one worker run.
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 30;

/// Signal tool names handed to the external AI client.
const JOURNAL_ENTRY_TOOL: &str = "generate_journal_entry";
const DAILY_SUMMARY_TOOL: &str = "generate_daily_summary";

/// Arguments of one worker invocation (mirrors the CLI flags).
#[derive(Debug, Clone)]
pub struct WorkerArgs {
    pub commit_hash: String,
    pub repo_path: PathBuf,
    pub timeout_secs: u64,
    /// Journal root inside the repository.
    pub journal_root: PathBuf,
}

impl WorkerArgs {
    pub fn new(commit_hash: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        let repo_path = repo_path.into();
        let journal_root = repo_path.join("journal");
        Self {
            commit_hash: commit_hash.into(),
            repo_path,
            timeout_secs: DEFAULT_WORKER_TIMEOUT_SECS,
            journal_root,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_journal_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.journal_root = root.into();
        self
    }
}

/// Run the worker to completion or deadline. Returns the status string
/// recorded in telemetry; the process exit code is 0 regardless.
pub async fn run_worker(args: WorkerArgs) -> &'static str {
    let provider: Arc<dyn LlmProvider> = Arc::new(ClaudeCliProvider::new("haiku"));
    run_worker_with(args, Arc::new(ChatExtractor::new()), provider).await
}

/// Worker entry with injected collaborators (tests supply their own
/// extractor and provider).
pub async fn run_worker_with(
    args: WorkerArgs,
    extractor: Arc<ChatExtractor>,
    provider: Arc<dyn LlmProvider>,
) -> &'static str {
    let deadline = Duration::from_secs(args.timeout_secs.max(1));
    match tokio::time::timeout(deadline, worker_inner(&args, extractor, provider)).await {
        Ok(status) => status,
        Err(_) => {
            // Deadline reached: terminate without emitting partial
            // signals.
            counter!("worker.timeout").increment(1);
            warn!(
                timeout_secs = args.timeout_secs,
                "worker deadline reached for commit {}", args.commit_hash
            );
            "timeout"
        }
    }
}

async fn worker_inner(
    args: &WorkerArgs,
    extractor: Arc<ChatExtractor>,
    provider: Arc<dyn LlmProvider>,
) -> &'static str {
    info!(
        commit_hash = %args.commit_hash,
        repo = %args.repo_path.display(),
        "worker starting"
    );

    // 1. Clear stale signals from the previous commit.
    match SignalStore::cleanup_for_new_commit(&args.repo_path) {
        Ok(cleared) => info!("cleared {cleared} stale signals"),
        Err(e) => {
            counter!("worker.errors.total", "step" => "cleanup").increment(1);
            warn!("signal cleanup failed: {e}");
        }
    }

    // 2. Orchestrate the journal entry.
    let journal_file = daily_entry_path(&args.journal_root, Utc::now().date_naive());
    let orchestrator = Orchestrator::new(extractor, provider);
    let result = orchestrator
        .orchestrate(&args.commit_hash, &args.repo_path, &journal_file)
        .await;

    if !result.success {
        counter!("worker.errors.total", "step" => "orchestration").increment(1);
        warn!(
            phase = ?result.phase,
            error = ?result.error,
            "orchestration failed; no journal entry for {}", args.commit_hash
        );
        return "orchestration_failed";
    }

    if let Some(entry) = &result.journal_entry {
        if let Err(e) = append_entry(&journal_file, &entry.to_markdown()) {
            counter!("worker.errors.total", "step" => "append").increment(1);
            warn!("could not append journal entry: {e}");
        }
    }

    // 3. Hand off to the external client via signals.
    write_signals(args, &journal_file);

    "ok"
}

/// Write the journal-entry signal, plus the daily-summary signal when a
/// date boundary was crossed. Signal failures degrade gracefully.
fn write_signals(args: &WorkerArgs, journal_file: &Path) {
    let store = SignalStore::new();
    let signal_dir = match SignalStore::ensure_directory(&args.repo_path) {
        Ok(dir) => dir,
        Err(e) => {
            counter!("worker.errors.total", "step" => "signal_directory").increment(1);
            warn!("signal directory unavailable: {e}");
            return;
        }
    };

    if let Err(e) = store.create(
        &signal_dir,
        JOURNAL_ENTRY_TOOL,
        Map::new(),
        &args.commit_hash,
    ) {
        counter!("worker.errors.total", "step" => "signal_create").increment(1);
        warn!("could not create journal-entry signal: {e}");
    }

    if let Some(date) = should_generate_daily_summary(journal_file, &args.journal_root) {
        let mut params = Map::new();
        params.insert(
            "date".to_string(),
            Value::String(date.format("%Y-%m-%d").to_string()),
        );
        match store.create(&signal_dir, DAILY_SUMMARY_TOOL, params, &args.commit_hash) {
            Ok(path) => info!("daily summary requested for {date}: {}", path.display()),
            Err(e) => {
                counter!("worker.errors.total", "step" => "signal_create").increment(1);
                warn!("could not create daily-summary signal: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commit_story_core::llm::{LlmError, ScriptedProvider};
    use pretty_assertions::assert_eq;
    use std::process::{Command, Stdio};
    use tempfile::TempDir;

    fn git(repo: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(repo)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("git available");
        assert!(status.success(), "git {args:?} failed");
    }

    fn repo_with_commit() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        git(dir.path(), &["config", "user.name", "Test Author"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "add a"]);
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (dir, hash)
    }

    fn empty_extractor() -> Arc<ChatExtractor> {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("workspaceStorage");
        std::fs::create_dir_all(&root).unwrap();
        std::mem::forget(dir);
        Arc::new(ChatExtractor::new().with_extra_roots(vec![root]))
    }

    fn provider() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::keyed(vec![(
            "Write a summary paragraph",
            r#"{"summary": "did the work"}"#,
        )]))
    }

    #[tokio::test]
    async fn test_worker_writes_entry_and_signal() {
        let (repo, hash) = repo_with_commit();
        let args = WorkerArgs::new(&hash, repo.path());

        let status = run_worker_with(args.clone(), empty_extractor(), provider()).await;
        assert_eq!(status, "ok");

        // The daily journal file exists and carries the entry.
        let journal_file =
            daily_entry_path(&args.journal_root, Utc::now().date_naive());
        let text = std::fs::read_to_string(&journal_file).unwrap();
        assert!(text.contains("did the work"));

        // Exactly one signal, for the journal entry, carrying the hash.
        let signal_dir = repo.path().join(".mcp-commit-story/signals");
        let signals: Vec<_> = std::fs::read_dir(&signal_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(signals.len(), 1);
        let body = std::fs::read_to_string(signals[0].path()).unwrap();
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["tool"], JOURNAL_ENTRY_TOOL);
        assert_eq!(doc["params"]["commit_hash"], hash.as_str());
    }

    #[tokio::test]
    async fn test_worker_requests_daily_summary_on_boundary() {
        let (repo, hash) = repo_with_commit();
        let args = WorkerArgs::new(&hash, repo.path());

        // A prior journal day with no summary yet.
        let daily_dir = args.journal_root.join("daily");
        std::fs::create_dir_all(&daily_dir).unwrap();
        std::fs::write(daily_dir.join("2020-01-05-journal.md"), "old entry").unwrap();

        let status = run_worker_with(args.clone(), empty_extractor(), provider()).await;
        assert_eq!(status, "ok");

        let signal_dir = repo.path().join(".mcp-commit-story/signals");
        let bodies: Vec<Value> = std::fs::read_dir(&signal_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| serde_json::from_str(&std::fs::read_to_string(e.path()).unwrap()).unwrap())
            .collect();
        assert_eq!(bodies.len(), 2, "journal entry + daily summary signals");
        let summary = bodies
            .iter()
            .find(|doc| doc["tool"] == DAILY_SUMMARY_TOOL)
            .expect("daily summary signal present");
        assert_eq!(summary["params"]["date"], "2020-01-05");
        assert_eq!(summary["params"]["commit_hash"], hash.as_str());
    }

    #[tokio::test]
    async fn test_worker_clears_stale_signals_first() {
        let (repo, hash) = repo_with_commit();
        let args = WorkerArgs::new(&hash, repo.path());

        let signal_dir = SignalStore::ensure_directory(repo.path()).unwrap();
        std::fs::write(signal_dir.join("stale.json"), "{}").unwrap();

        run_worker_with(args, empty_extractor(), provider()).await;

        assert!(
            !signal_dir.join("stale.json").exists(),
            "stale signal removed before new work"
        );
    }

    #[tokio::test]
    async fn test_worker_survives_orchestration_failure() {
        let dir = TempDir::new().unwrap(); // not a git repo
        let args = WorkerArgs::new("abc123", dir.path());

        let status = run_worker_with(args, empty_extractor(), provider()).await;
        assert_eq!(status, "orchestration_failed");
    }

    /// A provider that never responds; only the worker deadline ends
    /// the run.
    struct NeverProvider;

    #[async_trait::async_trait]
    impl LlmProvider for NeverProvider {
        async fn complete(
            &self,
            _request: commit_story_core::llm::CompletionRequest,
        ) -> Result<commit_story_core::llm::CompletionResponse, LlmError> {
            std::future::pending().await
        }
        fn name(&self) -> &str {
            "never"
        }
        fn model(&self) -> &str {
            "never"
        }
    }

    #[tokio::test]
    async fn test_worker_deadline_records_timeout() {
        let (repo, hash) = repo_with_commit();
        let args = WorkerArgs::new(&hash, repo.path()).with_timeout(1);

        let status = run_worker_with(args, empty_extractor(), Arc::new(NeverProvider)).await;
        assert_eq!(status, "timeout");
    }
}
