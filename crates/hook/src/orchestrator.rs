// crates/hook/src/orchestrator.rs
//! Journal orchestrator: three phases per commit.
//!
//! 1. Context collection — git, chat, and recent-journal context, each
//!    independently wrapped so one source failing leaves a null slot
//!    (git gets a minimal fallback instead, so generators still have a
//!    hash to work with).
//! 2. Generation — the seven registered generators, each timed, each
//!    allowed to fail alone.
//! 3. Validation and assembly — results are checked against their
//!    expected shape and replaced by typed fallbacks when wrong.
//!
//! `success` is true whenever context collection survived; false is
//! reserved for failures before generation could start.

use chrono::Utc;
use commit_story_core::executor::execute_generator;
use commit_story_core::generators::registry;
use commit_story_core::git::{collect_git_context, commit_time_window};
use commit_story_core::journal_files::{
    collect_recent_journal_context, date_from_journal_filename,
};
use commit_story_core::llm::LlmProvider;
use commit_story_cursor_db::ChatExtractor;
use commit_story_types::{
    ChatContext, GitContext, JournalContext, JournalEntry, SectionKind, SectionResult,
};
use metrics::counter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Timing and outcome counters for one orchestration run.
#[derive(Debug, Default, Clone)]
pub struct OrchestrationTelemetry {
    pub context_collection_ms: u64,
    pub generator_times_ms: BTreeMap<&'static str, u64>,
    pub total_generators: usize,
    pub successful_generators: usize,
    pub failed_generators: usize,
}

/// Outcome of one orchestration run.
#[derive(Debug)]
pub struct OrchestrationResult {
    pub success: bool,
    pub journal_entry: Option<JournalEntry>,
    pub error: Option<String>,
    /// Phase that aborted the run, when one did.
    pub phase: Option<&'static str>,
    pub execution_time_ms: u64,
    pub telemetry: OrchestrationTelemetry,
    pub errors: Vec<String>,
}

/// Drives context collection and section generation for one commit.
pub struct Orchestrator {
    extractor: Arc<ChatExtractor>,
    provider: Arc<dyn LlmProvider>,
}

impl Orchestrator {
    pub fn new(extractor: Arc<ChatExtractor>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            extractor,
            provider,
        }
    }

    /// Generate a journal entry for `commit_hash`. `journal_path` is
    /// the daily file the entry will land in; the journal root is its
    /// `daily/` parent's parent.
    pub async fn orchestrate(
        &self,
        commit_hash: &str,
        repo: &Path,
        journal_path: &Path,
    ) -> OrchestrationResult {
        let started = Instant::now();
        let span = tracing::info_span!(
            "orchestrate_journal_generation",
            commit_hash = %commit_hash
        );
        self.orchestrate_inner(commit_hash, repo, journal_path, started)
            .instrument(span)
            .await
    }

    async fn orchestrate_inner(
        &self,
        commit_hash: &str,
        repo: &Path,
        journal_path: &Path,
        started: Instant,
    ) -> OrchestrationResult {
        let mut telemetry = OrchestrationTelemetry::default();
        let mut errors: Vec<String> = Vec::new();

        info!("starting journal generation for commit {commit_hash}");
        counter!("orchestration.start.total").increment(1);

        // Pre-phase: an unreadable repository is the one failure that
        // aborts before generation.
        if !repo.join(".git").exists() {
            counter!("orchestration.failure.total", "phase" => "context_collection")
                .increment(1);
            let message = format!("repository unreadable: {}", repo.display());
            return OrchestrationResult {
                success: false,
                journal_entry: None,
                error: Some(message.clone()),
                phase: Some("context_collection"),
                execution_time_ms: started.elapsed().as_millis() as u64,
                telemetry,
                errors: vec![message],
            };
        }

        // Phase 1: context collection, each source wrapped.
        let context_started = Instant::now();
        let context = self
            .collect_context(commit_hash, repo, journal_path, &mut errors)
            .await;
        telemetry.context_collection_ms = context_started.elapsed().as_millis() as u64;

        // Phase 2: generation.
        let mut sections: BTreeMap<SectionKind, SectionResult> = BTreeMap::new();
        for generator in registry() {
            let name = generator.kind.name();
            let generator_started = Instant::now();
            let result = {
                let span = tracing::info_span!("generate_section", section = name);
                execute_generator(generator, &context, self.provider.as_ref())
                    .instrument(span)
                    .await
            };
            let elapsed = generator_started.elapsed();
            metrics::histogram!("orchestration.generator_duration_seconds", "section" => name)
                .record(elapsed.as_secs_f64());
            telemetry
                .generator_times_ms
                .insert(name, elapsed.as_millis() as u64);
            telemetry.total_generators += 1;
            match &result.error {
                None => telemetry.successful_generators += 1,
                Some(e) => {
                    telemetry.failed_generators += 1;
                    errors.push(format!("{name}: {e}"));
                    counter!("orchestration.generator_failure.total", "section" => name)
                        .increment(1);
                }
            }
            sections.insert(generator.kind, result);
        }

        // Phase 3: validation and assembly.
        let entry = assemble_entry(commit_hash, sections, &mut errors);

        counter!("orchestration.success.total").increment(1);
        info!(
            successful = telemetry.successful_generators,
            failed = telemetry.failed_generators,
            "journal generation finished for commit {commit_hash}"
        );

        OrchestrationResult {
            success: true,
            journal_entry: Some(entry),
            error: None,
            phase: None,
            execution_time_ms: started.elapsed().as_millis() as u64,
            telemetry,
            errors,
        }
    }

    async fn collect_context(
        &self,
        commit_hash: &str,
        repo: &Path,
        journal_path: &Path,
        errors: &mut Vec<String>,
    ) -> JournalContext {
        // Git context: a failure leaves the minimal fallback so the
        // generators still know the hash.
        let git = match collect_git_context(repo, commit_hash).await {
            Ok(context) => context,
            Err(e) => {
                warn!("git context collection failed: {e}");
                errors.push(format!("git_context: {e}"));
                GitContext::fallback(commit_hash)
            }
        };

        // Chat context: the extractor degrades internally; only a
        // panic in the blocking task leaves the slot null.
        let window = commit_time_window(repo, commit_hash).await;
        let chat: Option<ChatContext> = {
            let extractor = Arc::clone(&self.extractor);
            let repo = repo.to_path_buf();
            match tokio::task::spawn_blocking(move || {
                extractor.extract_chat_for_commit(&repo, &window)
            })
            .await
            {
                Ok(context) => Some(context),
                Err(e) => {
                    warn!("chat context collection panicked: {e}");
                    errors.push(format!("chat_context: {e}"));
                    None
                }
            }
        };

        // Recent journal context: best-effort.
        let journal_root = journal_root_of(journal_path);
        let current_date = journal_path
            .file_name()
            .and_then(|name| date_from_journal_filename(&name.to_string_lossy()))
            .unwrap_or_else(|| Utc::now().date_naive());
        let journal = journal_root
            .map(|root| collect_recent_journal_context(&root, current_date));

        JournalContext {
            git: Some(git),
            chat,
            journal,
        }
    }
}

/// `<root>/daily/<file>` → `<root>`.
fn journal_root_of(journal_path: &Path) -> Option<PathBuf> {
    let daily = journal_path.parent()?;
    daily.parent().map(Path::to_path_buf)
}

/// Validate each section against its expected shape and assemble the
/// entry. A mismatched section is replaced by its typed fallback.
fn assemble_entry(
    commit_hash: &str,
    mut sections: BTreeMap<SectionKind, SectionResult>,
    errors: &mut Vec<String>,
) -> JournalEntry {
    let mut take = |kind: SectionKind| -> SectionResult {
        match sections.remove(&kind) {
            Some(result) if result.kind() == kind => result,
            Some(result) => {
                errors.push(format!(
                    "{}: generator returned {:?} content",
                    kind.name(),
                    result.kind()
                ));
                SectionResult::fallback(kind, "generator returned the wrong section shape")
            }
            None => SectionResult::fallback(kind, "generator produced no result"),
        }
    };

    JournalEntry {
        timestamp: Utc::now().to_rfc3339(),
        commit_hash: commit_hash.to_string(),
        summary: take(SectionKind::Summary),
        technical_synopsis: take(SectionKind::TechnicalSynopsis),
        accomplishments: take(SectionKind::Accomplishments),
        frustrations: take(SectionKind::Frustrations),
        tone_mood: take(SectionKind::ToneMood),
        discussion_notes: take(SectionKind::DiscussionNotes),
        commit_metadata: take(SectionKind::CommitMetadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commit_story_core::llm::ScriptedProvider;
    use commit_story_types::SectionContent;
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

    fn full_provider() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::keyed(vec![
            ("Write a summary paragraph", r#"{"summary": "built the thing"}"#),
            ("technical synopsis", r#"{"technical_synopsis": "added a()"}"#),
            ("concrete accomplishments", r#"{"accomplishments": ["landed a()"]}"#),
            ("frustrations or roadblocks", r#"{"frustrations": []}"#),
            ("Infer the developer's mood", r#"{"mood": "calm", "indicators": "steady"}"#),
            ("Extract the discussion points", r#"{"discussion_notes": []}"#),
            ("key-value metadata", r#"{"commit_metadata": {"files": "1"}}"#),
        ]))
    }

    fn extractor_without_databases() -> Arc<ChatExtractor> {
        // Point at an empty root so no Cursor databases are found.
        let empty = TempDir::new().unwrap();
        let root = empty.path().join("workspaceStorage");
        std::fs::create_dir_all(&root).unwrap();
        std::mem::forget(empty);
        Arc::new(ChatExtractor::new().with_extra_roots(vec![root]))
    }

    #[tokio::test]
    async fn test_happy_path_succeeds_with_all_sections() {
        let (repo, hash) = repo_with_commit();
        let journal = TempDir::new().unwrap();
        let journal_file = journal.path().join("daily/2025-01-06-journal.md");

        let orchestrator = Orchestrator::new(extractor_without_databases(), full_provider());
        let result = orchestrator.orchestrate(&hash, repo.path(), &journal_file).await;

        assert!(result.success);
        assert!(result.error.is_none());
        let entry = result.journal_entry.unwrap();
        assert_eq!(entry.commit_hash, hash);
        match &entry.summary.content {
            SectionContent::Summary { text } => assert_eq!(text, "built the thing"),
            other => panic!("got {other:?}"),
        }
        assert_eq!(result.telemetry.total_generators, 7);
        assert_eq!(result.telemetry.successful_generators, 7);
        assert_eq!(result.telemetry.generator_times_ms.len(), 7);
    }

    #[tokio::test]
    async fn test_generator_failures_do_not_abort() {
        let (repo, hash) = repo_with_commit();
        let journal = TempDir::new().unwrap();
        let journal_file = journal.path().join("daily/2025-01-06-journal.md");

        // Only the summary generator gets a response; the rest see an
        // empty reply and fall back.
        let provider = Arc::new(ScriptedProvider::keyed(vec![(
            "Write a summary paragraph",
            r#"{"summary": "only section that worked"}"#,
        )]));
        let orchestrator = Orchestrator::new(extractor_without_databases(), provider);
        let result = orchestrator.orchestrate(&hash, repo.path(), &journal_file).await;

        assert!(result.success, "partial generation still succeeds");
        let entry = result.journal_entry.unwrap();
        assert!(entry.summary.error.is_none());
        assert!(entry.frustrations.error.is_some());
        assert!(result.telemetry.failed_generators > 0);
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_repository_fails_before_generation() {
        let not_a_repo = TempDir::new().unwrap();
        let journal = TempDir::new().unwrap();
        let journal_file = journal.path().join("daily/2025-01-06-journal.md");

        let orchestrator = Orchestrator::new(extractor_without_databases(), full_provider());
        let result = orchestrator
            .orchestrate("abc123", not_a_repo.path(), &journal_file)
            .await;

        assert!(!result.success);
        assert_eq!(result.phase, Some("context_collection"));
        assert!(result.journal_entry.is_none());
        assert_eq!(result.telemetry.total_generators, 0);
    }

    #[tokio::test]
    async fn test_missing_commit_uses_git_fallback_context() {
        let (repo, _) = repo_with_commit();
        let journal = TempDir::new().unwrap();
        let journal_file = journal.path().join("daily/2025-01-06-journal.md");

        let orchestrator = Orchestrator::new(extractor_without_databases(), full_provider());
        let result = orchestrator
            .orchestrate(
                "0000000000000000000000000000000000000000",
                repo.path(),
                &journal_file,
            )
            .await;

        // Commit lookup fails but the run proceeds on the fallback.
        assert!(result.success);
        assert!(result.errors.iter().any(|e| e.starts_with("git_context:")));
        let entry = result.journal_entry.unwrap();
        assert_eq!(entry.commit_hash, "0000000000000000000000000000000000000000");
    }

    #[test]
    fn test_journal_root_derivation() {
        assert_eq!(
            journal_root_of(Path::new("/j/daily/2025-01-06-journal.md")),
            Some(PathBuf::from("/j"))
        );
    }
}
