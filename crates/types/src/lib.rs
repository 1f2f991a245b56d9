// crates/types/src/lib.rs
//! Shared types for commit-story: the context data model handed to
//! section generators, typed section results, the error taxonomy, and
//! the `PartialSuccess` result shape used by fan-out operations.

pub mod context;
pub mod error;
pub mod partial;
pub mod section;

pub use context::{
    ChatContext, ChatMessage, DataQuality, ErrorInfo, ExtractionStatus, FileStats, GitContext,
    GitMetadata, JournalContext, MatchType, MessageRole, RecentJournalContext, SessionMeta,
    SizeClassification, TimeWindow, WindowStrategy, WorkspaceMatch,
};
pub use error::{CursorDbError, SignalError, TelemetryError, WorkspaceDetectionError};
pub use partial::{FailureDetail, PartialStatus, PartialSuccess};
pub use section::{DiscussionNote, JournalEntry, SectionContent, SectionKind, SectionResult};
