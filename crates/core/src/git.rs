// crates/core/src/git.rs
//! Git evidence collection via a spawned `git` subprocess.
//!
//! Reads only: commit metadata, parent hashes, numstat, and a capped
//! patch. Every invocation runs under a hard timeout so a wedged
//! repository can never stall the background worker.

use commit_story_types::{
    FileStats, GitContext, GitMetadata, SizeClassification, TimeWindow, WindowStrategy,
};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Timeout for git operations.
const GIT_TIMEOUT_SECS: u64 = 10;

/// Unit separator used in `--format` strings; never appears in commit
/// messages.
const FIELD_SEP: char = '\x1f';

/// Hard cap on how far a commit window may look back.
pub const MAX_LOOKBACK_HOURS: i64 = 48;
/// Window length used when no parent bound is available.
pub const FALLBACK_WINDOW_HOURS: i64 = 24;

/// Per-file cap on diff text carried into the journal context.
const PER_FILE_DIFF_CAP: usize = 10 * 1024;
/// Total cap on the assembled diff summary.
const TOTAL_DIFF_CAP: usize = 50 * 1024;

/// Path fragments whose diffs are noise, not narrative.
const GENERATED_MARKERS: &[&str] = &[
    "node_modules/",
    "target/",
    "dist/",
    "vendor/",
    ".min.js",
    ".min.css",
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "pnpm-lock.yaml",
];

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository: {path}")]
    NotARepo { path: String },

    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },

    #[error("git {args} timed out after {seconds}s")]
    Timeout { args: String, seconds: u64 },

    #[error("Commit not found: {hash}")]
    CommitNotFound { hash: String },

    #[error("Failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A commit's metadata as read from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub email: String,
    /// ISO-8601 committer date.
    pub date: String,
    /// Committer timestamp in UTC milliseconds.
    pub timestamp_ms: i64,
    pub parent_hashes: Vec<String>,
    pub message: String,
}

impl CommitInfo {
    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() >= 2
    }
}

async fn run_git(repo: &Path, args: &[&str]) -> Result<String, GitError> {
    let joined = args.join(" ");
    debug!("running git {joined} in {}", repo.display());

    let output = tokio::time::timeout(
        Duration::from_secs(GIT_TIMEOUT_SECS),
        Command::new("git")
            .args(args)
            .current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output(),
    )
    .await
    .map_err(|_| GitError::Timeout {
        args: joined.clone(),
        seconds: GIT_TIMEOUT_SECS,
    })??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo {
                path: repo.display().to_string(),
            });
        }
        if stderr.contains("unknown revision") || stderr.contains("bad revision") {
            return Err(GitError::CommitNotFound { hash: joined });
        }
        return Err(GitError::CommandFailed {
            args: joined,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Read one commit's metadata. `rev` may be a hash or `HEAD`.
pub async fn read_commit(repo: &Path, rev: &str) -> Result<CommitInfo, GitError> {
    let format = "%H\x1f%an\x1f%ae\x1f%cI\x1f%ct\x1f%P\x1f%B";
    let out = run_git(repo, &["show", "-s", &format!("--format={format}"), rev]).await?;

    let fields: Vec<&str> = out.trim_end().splitn(7, FIELD_SEP).collect();
    if fields.len() != 7 {
        return Err(GitError::CommandFailed {
            args: format!("show -s {rev}"),
            stderr: format!("unexpected format output ({} fields)", fields.len()),
        });
    }

    let timestamp_secs: i64 = fields[4].trim().parse().map_err(|_| GitError::CommandFailed {
        args: format!("show -s {rev}"),
        stderr: format!("unparseable committer timestamp: {}", fields[4]),
    })?;

    Ok(CommitInfo {
        hash: fields[0].to_string(),
        author: fields[1].to_string(),
        email: fields[2].to_string(),
        date: fields[3].to_string(),
        timestamp_ms: timestamp_secs * 1000,
        parent_hashes: fields[5]
            .split_whitespace()
            .map(String::from)
            .collect(),
        message: fields[6].trim_end().to_string(),
    })
}

/// Resolve the `[start, end]` window used to filter chat sessions for
/// a commit (all milliseconds, UTC).
///
/// - Parent available: `[parent_time, commit_time]`, `commit_based`.
/// - Initial commit: 24 h ending at the commit, `first_commit`.
/// - Git unreadable: 24 h ending now, `24_hour_fallback`.
/// - Window longer than 48 h: clamped, `bounded_lookback`.
pub async fn commit_time_window(repo: &Path, commit_hash: &str) -> TimeWindow {
    const HOUR_MS: i64 = 3_600_000;

    let commit = match read_commit(repo, commit_hash).await {
        Ok(commit) => commit,
        Err(e) => {
            debug!("time window falling back to now-based 24h: {e}");
            let end = chrono::Utc::now().timestamp_millis();
            return TimeWindow::new(
                end - FALLBACK_WINDOW_HOURS * HOUR_MS,
                end,
                WindowStrategy::TwentyFourHourFallback,
            );
        }
    };

    let end = commit.timestamp_ms;
    let Some(parent) = commit.parent_hashes.first() else {
        return TimeWindow::new(
            end - FALLBACK_WINDOW_HOURS * HOUR_MS,
            end,
            WindowStrategy::FirstCommit,
        );
    };

    match read_commit(repo, parent).await {
        Ok(parent) if parent.timestamp_ms < end => {
            let start = parent.timestamp_ms;
            if end - start > MAX_LOOKBACK_HOURS * HOUR_MS {
                TimeWindow::new(
                    end - MAX_LOOKBACK_HOURS * HOUR_MS,
                    end,
                    WindowStrategy::BoundedLookback,
                )
            } else {
                TimeWindow::new(start, end, WindowStrategy::CommitBased)
            }
        }
        // Parent unreadable, or a rebase left it at/after the child:
        // fall back to a 24 h window ending at the commit.
        _ => TimeWindow::new(
            end - FALLBACK_WINDOW_HOURS * HOUR_MS,
            end,
            WindowStrategy::TwentyFourHourFallback,
        ),
    }
}

/// True for files whose diffs should not be carried into the context.
fn is_generated(path: &str) -> bool {
    GENERATED_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Collect the full git context for one commit: metadata, changed
/// files, aggregate stats, and a size-capped diff summary with binary
/// and generated files filtered out.
pub async fn collect_git_context(repo: &Path, commit_hash: &str) -> Result<GitContext, GitError> {
    let commit = read_commit(repo, commit_hash).await?;

    // --numstat: "<ins>\t<del>\t<path>", with "-" for binary files.
    let numstat = run_git(repo, &["show", "--numstat", "--format=", commit_hash]).await?;

    let mut changed_files = Vec::new();
    let mut stats = FileStats::default();
    let mut binary_files = Vec::new();

    for line in numstat.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.splitn(3, '\t');
        let (Some(ins), Some(del), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let path = path.to_string();
        stats.files_changed += 1;
        if ins == "-" || del == "-" {
            binary_files.push(path.clone());
        } else {
            stats.insertions += ins.parse::<usize>().unwrap_or(0);
            stats.deletions += del.parse::<usize>().unwrap_or(0);
        }
        changed_files.push(path);
    }

    let patch = run_git(repo, &["show", "--patch", "--no-color", "--format=", commit_hash]).await?;
    let diff_summary = build_diff_summary(&patch, &stats, &binary_files);

    Ok(GitContext {
        metadata: GitMetadata {
            hash: commit.hash.clone(),
            author: format!("{} <{}>", commit.author, commit.email),
            date: commit.date.clone(),
            message: commit.message.clone(),
        },
        size_classification: SizeClassification::from_file_count(stats.files_changed),
        is_merge: commit.is_merge(),
        changed_files,
        diff_summary,
        file_stats: stats,
    })
}

/// Assemble the diff summary: a stats header, then per-file patches
/// with generated and binary files elided and size caps applied.
fn build_diff_summary(patch: &str, stats: &FileStats, binary_files: &[String]) -> String {
    let mut out = format!(
        "{} files changed, {} insertions(+), {} deletions(-)\n",
        stats.files_changed, stats.insertions, stats.deletions
    );

    for (path, body) in split_patch_by_file(patch) {
        if out.len() >= TOTAL_DIFF_CAP {
            out.push_str("\n[diff truncated: total size cap reached]\n");
            break;
        }
        if is_generated(&path) {
            out.push_str(&format!("\n--- {path} [generated file: diff omitted]\n"));
            continue;
        }
        if binary_files.iter().any(|b| b == &path) {
            out.push_str(&format!("\n--- {path} [binary file: diff omitted]\n"));
            continue;
        }
        if body.len() > PER_FILE_DIFF_CAP {
            out.push_str(&body[..PER_FILE_DIFF_CAP]);
            out.push_str(&format!("\n[diff for {path} truncated]\n"));
        } else {
            out.push_str(&body);
        }
    }

    out
}

/// Split a `git show --patch` output into `(path, chunk)` pairs on
/// `diff --git` boundaries.
fn split_patch_by_file(patch: &str) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = Vec::new();

    for line in patch.lines() {
        if let Some(rest) = line.strip_prefix("diff --git a/") {
            // "a/<path> b/<path>" — take the b/ side to follow renames.
            let path = rest
                .split(" b/")
                .last()
                .unwrap_or(rest)
                .to_string();
            files.push((path, String::new()));
        }
        if let Some((_, body)) = files.last_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git(repo: &Path, args: &[&str], env: &[(&str, &str)]) {
        let mut cmd = StdCommand::new("git");
        cmd.args(args).current_dir(repo);
        for (k, v) in env {
            cmd.env(k, v);
        }
        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .expect("git available in test environment");
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"], &[]);
        git(dir, &["config", "user.name", "Test Author"], &[]);
        git(dir, &["config", "user.email", "test@example.com"], &[]);
    }

    fn commit_at(repo: &Path, message: &str, epoch_secs: i64) {
        let date = format!("{epoch_secs} +0000");
        git(
            repo,
            &["commit", "-q", "--allow-empty", "-m", message],
            &[("GIT_COMMITTER_DATE", &date), ("GIT_AUTHOR_DATE", &date)],
        );
    }

    fn write_and_add(repo: &Path, name: &str, content: &str) {
        std::fs::write(repo.join(name), content).unwrap();
        git(repo, &["add", "."], &[]);
    }

    #[tokio::test]
    async fn test_read_commit_metadata() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write_and_add(dir.path(), "a.txt", "hello\n");
        commit_at(dir.path(), "add a.txt", 1_700_000_000);

        let commit = read_commit(dir.path(), "HEAD").await.unwrap();
        assert_eq!(commit.author, "Test Author");
        assert_eq!(commit.email, "test@example.com");
        assert_eq!(commit.message, "add a.txt");
        assert_eq!(commit.timestamp_ms, 1_700_000_000_000);
        assert!(commit.parent_hashes.is_empty());
        assert!(!commit.is_merge());
    }

    #[tokio::test]
    async fn test_window_commit_based() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        commit_at(dir.path(), "first", 1_000_000_000);
        commit_at(dir.path(), "second", 1_000_003_600);

        let window = commit_time_window(dir.path(), "HEAD").await;
        assert_eq!(window.strategy, WindowStrategy::CommitBased);
        assert_eq!(window.start_ms, 1_000_000_000_000);
        assert_eq!(window.end_ms, 1_000_003_600_000);
        assert_eq!(window.duration_hours, 1.0);
    }

    #[tokio::test]
    async fn test_window_first_commit_is_exactly_24h() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        commit_at(dir.path(), "initial", 1_700_000_000);

        let window = commit_time_window(dir.path(), "HEAD").await;
        assert_eq!(window.strategy, WindowStrategy::FirstCommit);
        assert_eq!(window.end_ms - window.start_ms, 24 * 3_600_000);
        assert_eq!(window.duration_hours, 24.0);
    }

    #[tokio::test]
    async fn test_window_bounded_lookback_clamps_to_48h() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        commit_at(dir.path(), "old", 1_700_000_000);
        // 72 hours later
        commit_at(dir.path(), "new", 1_700_000_000 + 72 * 3600);

        let window = commit_time_window(dir.path(), "HEAD").await;
        assert_eq!(window.strategy, WindowStrategy::BoundedLookback);
        assert_eq!(window.end_ms - window.start_ms, 48 * 3_600_000);
        assert_eq!(window.duration_hours, 48.0);
    }

    #[tokio::test]
    async fn test_window_fallback_when_not_a_repo() {
        let dir = TempDir::new().unwrap();
        let window = commit_time_window(dir.path(), "deadbeef").await;
        assert_eq!(window.strategy, WindowStrategy::TwentyFourHourFallback);
        assert_eq!(window.end_ms - window.start_ms, 24 * 3_600_000);
    }

    #[tokio::test]
    async fn test_collect_git_context_stats_and_diff() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write_and_add(dir.path(), "src.rs", "fn main() {}\n");
        commit_at(dir.path(), "base", 1_700_000_000);
        write_and_add(dir.path(), "src.rs", "fn main() { println!(\"hi\"); }\n");
        commit_at(dir.path(), "teach main to speak", 1_700_000_100);

        let ctx = collect_git_context(dir.path(), "HEAD").await.unwrap();
        assert_eq!(ctx.metadata.message, "teach main to speak");
        assert!(ctx.metadata.author.contains("Test Author"));
        assert!(ctx.metadata.author.contains("test@example.com"));
        assert_eq!(ctx.changed_files, vec!["src.rs".to_string()]);
        assert_eq!(ctx.file_stats.files_changed, 1);
        assert_eq!(ctx.file_stats.insertions, 1);
        assert_eq!(ctx.file_stats.deletions, 1);
        assert_eq!(ctx.size_classification, SizeClassification::Small);
        assert!(!ctx.is_merge);
        assert!(ctx.diff_summary.contains("println"));
    }

    #[tokio::test]
    async fn test_generated_files_elided_from_diff() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write_and_add(dir.path(), "Cargo.lock", "version = 1\n");
        write_and_add(dir.path(), "main.rs", "fn main() {}\n");
        commit_at(dir.path(), "add files", 1_700_000_000);

        let ctx = collect_git_context(dir.path(), "HEAD").await.unwrap();
        assert!(ctx.changed_files.contains(&"Cargo.lock".to_string()));
        assert!(ctx.diff_summary.contains("Cargo.lock [generated file: diff omitted]"));
        assert!(!ctx.diff_summary.contains("version = 1"));
        assert!(ctx.diff_summary.contains("fn main"));
    }

    #[tokio::test]
    async fn test_missing_commit_is_error() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        commit_at(dir.path(), "only", 1_700_000_000);

        let err = collect_git_context(dir.path(), "0000000000000000000000000000000000000000")
            .await
            .unwrap_err();
        assert!(
            matches!(err, GitError::CommitNotFound { .. } | GitError::CommandFailed { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_split_patch_by_file() {
        let patch = "diff --git a/a.rs b/a.rs\n+line1\ndiff --git a/b.rs b/b.rs\n+line2\n";
        let files = split_patch_by_file(patch);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, "a.rs");
        assert!(files[0].1.contains("+line1"));
        assert_eq!(files[1].0, "b.rs");
        assert!(files[1].1.contains("+line2"));
    }

    #[test]
    fn test_is_generated_markers() {
        assert!(is_generated("package-lock.json"));
        assert!(is_generated("web/dist/bundle.min.js"));
        assert!(is_generated("Cargo.lock"));
        assert!(!is_generated("src/main.rs"));
    }
}
