// crates/types/src/context.rs
//! The context data model: everything collected per commit and handed
//! to the section generators as one serialized `JournalContext`.
//!
//! `JournalContext` is a total record — every field is always present
//! when serialized, with `null` standing in for a source that could not
//! be collected. Generators never see missing keys.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Speaker role of a chat message, mapped from Cursor's numeric role
/// tags at extraction time (1 → user, 2 → assistant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Map Cursor's numeric role tag. Unknown tags return `None` and
    /// the message is skipped by the provider.
    pub fn from_role_tag(tag: i64) -> Option<Self> {
        match tag {
            1 => Some(Self::User),
            2 => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One chat message, flattened from a Cursor bubble.
///
/// Individual bubbles carry no timestamps; `timestamp_ms` is the owning
/// session's `createdAt` — every message in a session shares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp_ms: i64,
    pub composer_id: String,
    pub bubble_id: String,
    pub session_name: String,
}

/// How a commit time window was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStrategy {
    #[serde(rename = "commit_based")]
    CommitBased,
    #[serde(rename = "first_commit")]
    FirstCommit,
    #[serde(rename = "24_hour_fallback")]
    TwentyFourHourFallback,
    #[serde(rename = "bounded_lookback")]
    BoundedLookback,
}

/// The `[start, end]` millisecond range used to filter chat sessions
/// for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    pub strategy: WindowStrategy,
    /// Window length in hours, reported to 0.1 h precision.
    pub duration_hours: f64,
}

impl TimeWindow {
    /// Build a window, deriving `duration_hours`. `start_ms` must be
    /// strictly less than `end_ms`; this is an invariant of every
    /// resolver strategy, so a violation is a programmer error.
    pub fn new(start_ms: i64, end_ms: i64, strategy: WindowStrategy) -> Self {
        assert!(start_ms < end_ms, "time window requires start < end");
        let hours = (end_ms - start_ms) as f64 / 3_600_000.0;
        Self {
            start_ms,
            end_ms,
            strategy,
            duration_hours: (hours * 10.0).round() / 10.0,
        }
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.end_ms
    }
}

/// Session metadata as stored in the workspace database's
/// `composer.composerData` blob (`allComposers` array).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub composer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub last_updated_at: Option<i64>,
    #[serde(rename = "type", default)]
    pub session_type: Option<String>,
}

/// Outcome classification of a multi-database extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Complete,
    Partial,
    Empty,
}

/// Structured description of why an extraction degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error_type: String,
    pub message: String,
}

/// Data-quality metadata attached to every `ChatContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQuality {
    pub databases_found: usize,
    pub databases_queried: usize,
    pub databases_failed: usize,
    pub status: ExtractionStatus,
    pub failure_reasons: Vec<String>,
    pub error_info: Option<ErrorInfo>,
}

impl DataQuality {
    pub fn empty() -> Self {
        Self {
            databases_found: 0,
            databases_queried: 0,
            databases_failed: 0,
            status: ExtractionStatus::Empty,
            failure_reasons: Vec::new(),
            error_info: None,
        }
    }
}

/// Output of multi-database chat extraction: chronologically ordered
/// messages plus the window and quality metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContext {
    pub messages: Vec<ChatMessage>,
    pub time_window: Option<TimeWindow>,
    pub session_names: Vec<String>,
    pub data_quality: DataQuality,
}

impl ChatContext {
    /// Empty context for graceful degradation, carrying the error that
    /// prevented extraction.
    pub fn empty_with_error(time_window: Option<TimeWindow>, error_info: ErrorInfo) -> Self {
        let mut data_quality = DataQuality::empty();
        data_quality.error_info = Some(error_info);
        Self {
            messages: Vec::new(),
            time_window,
            session_names: Vec::new(),
            data_quality,
        }
    }
}

/// Commit metadata surfaced to generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitMetadata {
    pub hash: String,
    pub author: String,
    /// ISO-8601 commit date.
    pub date: String,
    pub message: String,
}

/// Aggregate diff statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// Rough size bucket of a commit, by changed-file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClassification {
    Small,
    Medium,
    Large,
}

impl SizeClassification {
    pub fn from_file_count(files: usize) -> Self {
        match files {
            0..=5 => Self::Small,
            6..=20 => Self::Medium,
            _ => Self::Large,
        }
    }
}

/// Git evidence for one commit: metadata, changed files, capped diffs,
/// stats, and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitContext {
    pub metadata: GitMetadata,
    pub changed_files: Vec<String>,
    pub diff_summary: String,
    pub file_stats: FileStats,
    pub size_classification: SizeClassification,
    pub is_merge: bool,
}

impl GitContext {
    /// Minimal fallback used when git context collection fails, so
    /// generators can still produce output keyed by the hash.
    pub fn fallback(commit_hash: &str) -> Self {
        Self {
            metadata: GitMetadata {
                hash: commit_hash.to_string(),
                author: String::new(),
                date: String::new(),
                message: "Context collection failed".to_string(),
            },
            changed_files: Vec::new(),
            diff_summary: "Git context unavailable".to_string(),
            file_stats: FileStats::default(),
            size_classification: SizeClassification::Small,
            is_merge: false,
        }
    }
}

/// The most recent prior journal entry, surfaced to generators so they
/// can avoid repeating themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentJournalContext {
    pub latest_entry: Option<String>,
    pub additional_context: Vec<String>,
}

/// The composite context handed to every generator. Total structure:
/// all three keys are always serialized; unavailable sources are null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalContext {
    pub git: Option<GitContext>,
    pub chat: Option<ChatContext>,
    pub journal: Option<RecentJournalContext>,
}

/// How a repository was paired with a workspace database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    GitRemote,
    FolderPath,
    FolderName,
    MostRecent,
}

/// A ranked pairing of a repository with a workspace database.
///
/// Invariant: `MostRecent` matches carry confidence 0.0 and are used
/// only as fallback below the detection threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMatch {
    pub database_path: PathBuf,
    pub confidence: f64,
    pub match_type: MatchType,
    pub workspace_folder: Option<String>,
    pub git_remote: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_role_tag_mapping() {
        assert_eq!(MessageRole::from_role_tag(1), Some(MessageRole::User));
        assert_eq!(MessageRole::from_role_tag(2), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::from_role_tag(3), None);
        assert_eq!(MessageRole::from_role_tag(0), None);
    }

    #[test]
    fn test_window_duration_precision() {
        let w = TimeWindow::new(0, 3_600_000, WindowStrategy::CommitBased);
        assert_eq!(w.duration_hours, 1.0);

        // 90 minutes → 1.5 h
        let w = TimeWindow::new(0, 5_400_000, WindowStrategy::CommitBased);
        assert_eq!(w.duration_hours, 1.5);

        // 10 minutes rounds to 0.2 h
        let w = TimeWindow::new(0, 600_000, WindowStrategy::CommitBased);
        assert_eq!(w.duration_hours, 0.2);
    }

    #[test]
    #[should_panic(expected = "start < end")]
    fn test_window_rejects_inverted_range() {
        let _ = TimeWindow::new(10, 5, WindowStrategy::CommitBased);
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let w = TimeWindow::new(100, 200, WindowStrategy::CommitBased);
        assert!(w.contains(100));
        assert!(w.contains(200));
        assert!(!w.contains(99));
        assert!(!w.contains(201));
    }

    #[test]
    fn test_window_strategy_serde_names() {
        assert_eq!(
            serde_json::to_string(&WindowStrategy::TwentyFourHourFallback).unwrap(),
            "\"24_hour_fallback\""
        );
        assert_eq!(
            serde_json::to_string(&WindowStrategy::CommitBased).unwrap(),
            "\"commit_based\""
        );
    }

    #[test]
    fn test_session_meta_deserializes_cursor_shape() {
        let json = r#"{
            "composerId": "abc-123",
            "name": "Fix flaky test",
            "createdAt": 1700000000000,
            "lastUpdatedAt": 1700000600000,
            "type": "head"
        }"#;
        let meta: SessionMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.composer_id, "abc-123");
        assert_eq!(meta.created_at, Some(1_700_000_000_000));
        assert_eq!(meta.session_type.as_deref(), Some("head"));
    }

    #[test]
    fn test_session_meta_tolerates_missing_fields() {
        let meta: SessionMeta = serde_json::from_str(r#"{"composerId": "x"}"#).unwrap();
        assert!(meta.created_at.is_none());
        assert!(meta.name.is_none());
    }

    #[test]
    fn test_size_classification_buckets() {
        assert_eq!(SizeClassification::from_file_count(0), SizeClassification::Small);
        assert_eq!(SizeClassification::from_file_count(5), SizeClassification::Small);
        assert_eq!(SizeClassification::from_file_count(6), SizeClassification::Medium);
        assert_eq!(SizeClassification::from_file_count(20), SizeClassification::Medium);
        assert_eq!(SizeClassification::from_file_count(21), SizeClassification::Large);
    }

    #[test]
    fn test_git_fallback_shape() {
        let ctx = GitContext::fallback("abc123");
        assert_eq!(ctx.metadata.hash, "abc123");
        assert_eq!(ctx.metadata.message, "Context collection failed");
        assert_eq!(ctx.diff_summary, "Git context unavailable");
        assert!(ctx.changed_files.is_empty());
        assert_eq!(ctx.file_stats, FileStats::default());
    }

    #[test]
    fn test_journal_context_is_total() {
        // Absent sources serialize as explicit nulls, never missing keys.
        let ctx = JournalContext {
            git: None,
            chat: None,
            journal: None,
        };
        let value = serde_json::to_value(&ctx).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("git"));
        assert!(obj.contains_key("chat"));
        assert!(obj.contains_key("journal"));
        assert!(obj["git"].is_null());
    }

    #[test]
    fn test_empty_chat_context_carries_error_info() {
        let ctx = ChatContext::empty_with_error(
            None,
            ErrorInfo {
                error_type: "database_not_found".to_string(),
                message: "no Cursor databases present".to_string(),
            },
        );
        assert!(ctx.messages.is_empty());
        assert_eq!(ctx.data_quality.status, ExtractionStatus::Empty);
        assert!(ctx.data_quality.error_info.is_some());
    }
}
