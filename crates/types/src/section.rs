// crates/types/src/section.rs
//! Typed section results and the per-commit journal entry aggregate.
//!
//! Each generator returns exactly one `SectionResult`; invalid or
//! failed generations are replaced by the kind's typed fallback with an
//! error note, never by a missing section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed set of section generators, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Summary,
    TechnicalSynopsis,
    Accomplishments,
    Frustrations,
    ToneMood,
    DiscussionNotes,
    CommitMetadata,
}

impl SectionKind {
    pub const ALL: [SectionKind; 7] = [
        SectionKind::Summary,
        SectionKind::TechnicalSynopsis,
        SectionKind::Accomplishments,
        SectionKind::Frustrations,
        SectionKind::ToneMood,
        SectionKind::DiscussionNotes,
        SectionKind::CommitMetadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::TechnicalSynopsis => "technical_synopsis",
            Self::Accomplishments => "accomplishments",
            Self::Frustrations => "frustrations",
            Self::ToneMood => "tone_mood",
            Self::DiscussionNotes => "discussion_notes",
            Self::CommitMetadata => "commit_metadata",
        }
    }
}

/// A discussion point, with optional speaker attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
}

/// Typed payload of one generated section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionContent {
    Summary { text: String },
    TechnicalSynopsis { text: String },
    Accomplishments { items: Vec<String> },
    Frustrations { items: Vec<String> },
    ToneMood {
        mood: Option<String>,
        indicators: Option<String>,
    },
    DiscussionNotes { items: Vec<DiscussionNote> },
    CommitMetadata { map: BTreeMap<String, String> },
}

impl SectionContent {
    pub fn kind(&self) -> SectionKind {
        match self {
            Self::Summary { .. } => SectionKind::Summary,
            Self::TechnicalSynopsis { .. } => SectionKind::TechnicalSynopsis,
            Self::Accomplishments { .. } => SectionKind::Accomplishments,
            Self::Frustrations { .. } => SectionKind::Frustrations,
            Self::ToneMood { .. } => SectionKind::ToneMood,
            Self::DiscussionNotes { .. } => SectionKind::DiscussionNotes,
            Self::CommitMetadata { .. } => SectionKind::CommitMetadata,
        }
    }

    /// The kind's typed empty default: empty string, empty list, null
    /// mood, or empty map.
    pub fn default_for(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Summary => Self::Summary { text: String::new() },
            SectionKind::TechnicalSynopsis => Self::TechnicalSynopsis { text: String::new() },
            SectionKind::Accomplishments => Self::Accomplishments { items: Vec::new() },
            SectionKind::Frustrations => Self::Frustrations { items: Vec::new() },
            SectionKind::ToneMood => Self::ToneMood {
                mood: None,
                indicators: None,
            },
            SectionKind::DiscussionNotes => Self::DiscussionNotes { items: Vec::new() },
            SectionKind::CommitMetadata => Self::CommitMetadata { map: BTreeMap::new() },
        }
    }

    /// True when the payload carries no content at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Summary { text } | Self::TechnicalSynopsis { text } => text.is_empty(),
            Self::Accomplishments { items } | Self::Frustrations { items } => items.is_empty(),
            Self::ToneMood { mood, indicators } => mood.is_none() && indicators.is_none(),
            Self::DiscussionNotes { items } => items.is_empty(),
            Self::CommitMetadata { map } => map.is_empty(),
        }
    }
}

/// One generated section plus its error note and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub content: SectionContent,
    /// Why a fallback was used, when it was.
    pub error: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl SectionResult {
    pub fn ok(content: SectionContent) -> Self {
        Self {
            content,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Typed fallback carrying the reason the real result was unusable.
    pub fn fallback(kind: SectionKind, error: impl Into<String>) -> Self {
        Self {
            content: SectionContent::default_for(kind),
            error: Some(error.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> SectionKind {
        self.content.kind()
    }
}

/// A commit-keyed journal entry: timestamp, hash, and the seven
/// section results. The polished Markdown rendering is the external
/// renderer's concern; `to_markdown` produces the hand-off skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// ISO-8601 generation timestamp.
    pub timestamp: String,
    pub commit_hash: String,
    pub summary: SectionResult,
    pub technical_synopsis: SectionResult,
    pub accomplishments: SectionResult,
    pub frustrations: SectionResult,
    pub tone_mood: SectionResult,
    pub discussion_notes: SectionResult,
    pub commit_metadata: SectionResult,
}

impl JournalEntry {
    pub fn section(&self, kind: SectionKind) -> &SectionResult {
        match kind {
            SectionKind::Summary => &self.summary,
            SectionKind::TechnicalSynopsis => &self.technical_synopsis,
            SectionKind::Accomplishments => &self.accomplishments,
            SectionKind::Frustrations => &self.frustrations,
            SectionKind::ToneMood => &self.tone_mood,
            SectionKind::DiscussionNotes => &self.discussion_notes,
            SectionKind::CommitMetadata => &self.commit_metadata,
        }
    }

    /// Markdown skeleton for hand-off. Empty sections are omitted.
    pub fn to_markdown(&self) -> String {
        let short_hash = &self.commit_hash[..self.commit_hash.len().min(8)];
        let mut out = format!("### {} — Commit {}\n", self.timestamp, short_hash);

        let text_section = |out: &mut String, header: &str, text: &str| {
            if !text.is_empty() {
                out.push_str(&format!("\n#### {header}\n\n{text}\n"));
            }
        };
        let list_section = |out: &mut String, header: &str, items: &[String]| {
            if !items.is_empty() {
                out.push_str(&format!("\n#### {header}\n\n"));
                for item in items {
                    out.push_str(&format!("- {item}\n"));
                }
            }
        };

        if let SectionContent::Summary { text } = &self.summary.content {
            text_section(&mut out, "Summary", text);
        }
        if let SectionContent::TechnicalSynopsis { text } = &self.technical_synopsis.content {
            text_section(&mut out, "Technical Synopsis", text);
        }
        if let SectionContent::Accomplishments { items } = &self.accomplishments.content {
            list_section(&mut out, "Accomplishments", items);
        }
        if let SectionContent::Frustrations { items } = &self.frustrations.content {
            list_section(&mut out, "Frustrations", items);
        }
        if let SectionContent::ToneMood { mood, indicators } = &self.tone_mood.content {
            if let Some(mood) = mood {
                out.push_str(&format!("\n#### Tone/Mood\n\n> {mood}\n"));
                if let Some(indicators) = indicators {
                    out.push_str(&format!("> {indicators}\n"));
                }
            }
        }
        if let SectionContent::DiscussionNotes { items } = &self.discussion_notes.content {
            if !items.is_empty() {
                out.push_str("\n#### Discussion Notes\n\n");
                for note in items {
                    match &note.speaker {
                        Some(speaker) => {
                            out.push_str(&format!("- **{}**: {}\n", speaker, note.text))
                        }
                        None => out.push_str(&format!("- {}\n", note.text)),
                    }
                }
            }
        }
        if let SectionContent::CommitMetadata { map } = &self.commit_metadata.content {
            if !map.is_empty() {
                out.push_str("\n#### Commit Metadata\n\n");
                for (key, value) in map {
                    out.push_str(&format!("- **{key}**: {value}\n"));
                }
            }
        }

        out
    }
}
