// crates/cursor-db/src/workspace.rs
//! Fuzzy matching of a git repository to its Cursor workspace database.
//!
//! Matching runs three strategies in descending trust: remembered git
//! remote URL, exact folder path, and normalised folder-name
//! similarity. Anything under the confidence threshold falls back to
//! the most-recently-modified database at confidence 0.0.

use crate::platform::WORKSPACE_DB_NAME;
use commit_story_types::{MatchType, WorkspaceDetectionError, WorkspaceMatch};
use regex_lite::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Minimum confidence for a strategy match to win outright.
const CONFIDENCE_THRESHOLD: f64 = 0.80;
/// Confidence assigned to a git-remote match.
const GIT_REMOTE_CONFIDENCE: f64 = 0.95;
/// Confidence assigned to an exact folder-path match.
const FOLDER_PATH_CONFIDENCE: f64 = 0.85;
/// Folder-name similarity never reaches folder-path trust.
const FOLDER_NAME_CAP: f64 = 0.89;

/// A workspace-storage entry that could back the repository.
#[derive(Debug, Clone)]
pub struct WorkspaceCandidate {
    pub database_path: PathBuf,
    /// The `folder` URI from `workspace.json`, when parseable.
    pub folder_uri: Option<String>,
    pub last_modified: SystemTime,
}

impl WorkspaceCandidate {
    /// Resolve the `file://` folder URI to a local path.
    pub fn folder_path(&self) -> Option<PathBuf> {
        folder_uri_to_path(self.folder_uri.as_deref()?)
    }
}

/// Scan the given roots for workspace directories holding both a
/// `workspace.json` and a database file. Corrupted `workspace.json`
/// files are tolerated — the candidate is kept with no folder URI so it
/// can still serve as a most-recent fallback.
pub fn enumerate_candidates(roots: &[PathBuf]) -> Vec<WorkspaceCandidate> {
    let mut candidates = Vec::new();

    for root in roots {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("skipping unreadable workspace root {}: {e}", root.display());
                continue;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let database_path = dir.join(WORKSPACE_DB_NAME);
            if !database_path.is_file() {
                continue;
            }

            let folder_uri = fs::read_to_string(dir.join("workspace.json"))
                .ok()
                .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
                .and_then(|doc| doc.get("folder")?.as_str().map(String::from));

            let last_modified = fs::metadata(&database_path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            candidates.push(WorkspaceCandidate {
                database_path,
                folder_uri,
                last_modified,
            });
        }
    }

    candidates
}

/// Match a repository to the best workspace database.
///
/// # Errors
/// Fails only when no candidates exist at all, so the fallback has
/// nothing to return.
pub fn detect_workspace(
    repo_path: &Path,
    roots: &[PathBuf],
) -> Result<WorkspaceMatch, WorkspaceDetectionError> {
    let candidates = enumerate_candidates(roots);
    let candidates_scanned = candidates.len();

    if candidates.is_empty() {
        return Err(WorkspaceDetectionError {
            repo_path: repo_path.to_path_buf(),
            candidates_scanned,
            fallback_attempted: true,
        });
    }

    let repo_remotes = read_git_remotes(repo_path);
    let repo_canonical = repo_path.canonicalize().unwrap_or_else(|_| repo_path.to_path_buf());
    let repo_name = normalize_name(
        &repo_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    );

    let mut scored: Vec<(f64, MatchType, &WorkspaceCandidate)> = candidates
        .iter()
        .map(|candidate| {
            let (confidence, match_type) =
                score_candidate(candidate, &repo_remotes, &repo_canonical, &repo_name);
            (confidence, match_type, candidate)
        })
        .collect();

    // Highest confidence first; more recent database breaks ties.
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.2.last_modified.cmp(&a.2.last_modified))
    });

    let (confidence, match_type, best) = scored[0];
    if confidence >= CONFIDENCE_THRESHOLD {
        debug!(
            "workspace match: {:?} at {confidence:.2} via {match_type:?}",
            best.database_path
        );
        return Ok(workspace_match(best, confidence, match_type, &repo_remotes));
    }

    // Fallback: the most-recently-modified database, confidence 0.0.
    let most_recent = candidates
        .iter()
        .max_by_key(|c| c.last_modified)
        .expect("candidates is non-empty");
    debug!(
        "no candidate above threshold ({candidates_scanned} scanned), \
         falling back to most recent: {:?}",
        most_recent.database_path
    );
    Ok(workspace_match(
        most_recent,
        0.0,
        MatchType::MostRecent,
        &repo_remotes,
    ))
}

fn workspace_match(
    candidate: &WorkspaceCandidate,
    confidence: f64,
    match_type: MatchType,
    repo_remotes: &[String],
) -> WorkspaceMatch {
    WorkspaceMatch {
        database_path: candidate.database_path.clone(),
        confidence,
        match_type,
        workspace_folder: candidate.folder_uri.clone(),
        git_remote: repo_remotes.first().cloned(),
    }
}

fn score_candidate(
    candidate: &WorkspaceCandidate,
    repo_remotes: &[String],
    repo_canonical: &Path,
    repo_name: &str,
) -> (f64, MatchType) {
    let folder = candidate.folder_path();

    if !repo_remotes.is_empty() {
        if let Some(folder) = &folder {
            let candidate_remotes = read_git_remotes(folder);
            if candidate_remotes
                .iter()
                .any(|r| repo_remotes.contains(r))
            {
                return (GIT_REMOTE_CONFIDENCE, MatchType::GitRemote);
            }
        }
    }

    if let Some(folder) = &folder {
        let folder_canonical = folder.canonicalize().unwrap_or_else(|_| folder.clone());
        if folder_canonical == repo_canonical {
            return (FOLDER_PATH_CONFIDENCE, MatchType::FolderPath);
        }

        if !repo_name.is_empty() {
            if let Some(name) = folder.file_name() {
                let candidate_name = normalize_name(&name.to_string_lossy());
                let ratio = name_similarity(repo_name, &candidate_name);
                if ratio > 0.0 {
                    return (ratio.min(FOLDER_NAME_CAP), MatchType::FolderName);
                }
            }
        }
    }

    (0.0, MatchType::MostRecent)
}

/// Character-level similarity in `[0.0, 1.0]` between two normalised
/// folder names.
fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    similar::TextDiff::from_chars(a, b).ratio() as f64
}

/// Case-insensitive, `_`/`-`-equivalent folder-name normalisation.
fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

/// Best-effort remote URLs from `.git/config`; empty on any failure.
fn read_git_remotes(repo_path: &Path) -> Vec<String> {
    let config = repo_path.join(".git").join("config");
    let Ok(text) = fs::read_to_string(config) else {
        return Vec::new();
    };
    let url_line = Regex::new(r"^\s*url\s*=\s*(.+)$").expect("static regex");
    text.lines()
        .filter_map(|line| url_line.captures(line))
        .map(|caps| normalize_remote(&caps[1]))
        .collect()
}

/// Normalise a remote URL for comparison: trim, lowercase, drop a
/// trailing `.git`.
fn normalize_remote(url: &str) -> String {
    let trimmed = url.trim().to_lowercase();
    trimmed
        .strip_suffix(".git")
        .map(String::from)
        .unwrap_or(trimmed)
}

fn folder_uri_to_path(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file://")?;
    let decoded = urlencoding::decode(rest).ok()?;
    Some(PathBuf::from(decoded.into_owned()))
}
