// crates/core/src/generators.rs
//! The generator registry: one entry per journal section, pairing the
//! prompt documentation with the parser that interprets the model's
//! response. Behaviour is keyed off these entries, never off function
//! reflection.

use commit_story_types::SectionKind;

/// How a generator's raw response is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserTag {
    /// JSON object with the expected string key, else raw text.
    Text,
    /// JSON object with an array under the expected key, else
    /// newline-split.
    List,
    /// JSON object, else labelled `Mood:` / `Indicators:` lines.
    ToneMood,
    /// JSON object of string pairs, else empty map.
    MetadataMap,
}

/// One registered section generator.
#[derive(Debug)]
pub struct Generator {
    pub kind: SectionKind,
    /// The key the model is asked to put its payload under.
    pub expected_key: &'static str,
    pub parser: ParserTag,
    /// The verbatim prompt documentation sent ahead of the JSON
    /// context.
    pub prompt_doc: &'static str,
}

const SUMMARY_PROMPT: &str = "\
Write a summary paragraph for this commit's journal entry.

Describe what was worked on and why, in plain language a developer
would use to tell a colleague about their day. Ground every statement
in the git diff and the chat transcript provided in the JSON context.
Do NOT invent work that is not evidenced there. If the context is thin,
write a shorter summary rather than padding it.

Respond with JSON: {\"summary\": \"...\"}";

const TECHNICAL_SYNOPSIS_PROMPT: &str = "\
Write a technical synopsis for this commit's journal entry.

Focus on the engineering substance: what changed structurally, which
approaches were taken, and any notable implementation details visible
in the diff. Use precise technical language. Do NOT speculate about
code that is not in the diff.

Respond with JSON: {\"technical_synopsis\": \"...\"}";

const ACCOMPLISHMENTS_PROMPT: &str = "\
List the concrete accomplishments evidenced by this commit and its
chat transcript.

Each item is one completed thing, phrased as a past-tense bullet.
Only include work that actually happened in this commit's context;
an empty list is a valid answer.

Respond with JSON: {\"accomplishments\": [\"...\"]}";

const FRUSTRATIONS_PROMPT: &str = "\
List frustrations or roadblocks the developer hit during this work.

Look for failed attempts, repeated errors, and expressions of
irritation in the chat transcript. Only report frustrations that are
explicitly present; an empty list is the correct answer for a smooth
session.

Respond with JSON: {\"frustrations\": [\"...\"]}";

const TONE_MOOD_PROMPT: &str = "\
Infer the developer's mood during this work, with the evidence that
supports it.

Use only explicit signals in the chat transcript (wording, punctuation,
stated feelings). If there is no clear signal, return null for the
mood rather than guessing.

Respond with JSON: {\"mood\": \"...\", \"indicators\": \"...\"}";

const DISCUSSION_NOTES_PROMPT: &str = "\
Extract the discussion points from the chat transcript that shaped
this commit: technical decisions and their reasoning, problem-solving
approaches, and key questions and answers.

Exclude secrets, personal information, and routine procedure. Each
note may carry a speaker attribution when the speaker is identifiable.
Do NOT invent or embellish; if in doubt, leave it out.

Respond with JSON: {\"discussion_notes\": [{\"speaker\": \"...\", \"text\": \"...\"}]}";

const COMMIT_METADATA_PROMPT: &str = "\
Produce key-value metadata describing this commit for the journal
entry footer: things like files changed, size classification, and
whether it was a merge. Values are short strings taken from the git
context.

Respond with JSON: {\"commit_metadata\": {\"key\": \"value\"}}";

static REGISTRY: [Generator; 7] = [
    Generator {
        kind: SectionKind::Summary,
        expected_key: "summary",
        parser: ParserTag::Text,
        prompt_doc: SUMMARY_PROMPT,
    },
    Generator {
        kind: SectionKind::TechnicalSynopsis,
        expected_key: "technical_synopsis",
        parser: ParserTag::Text,
        prompt_doc: TECHNICAL_SYNOPSIS_PROMPT,
    },
    Generator {
        kind: SectionKind::Accomplishments,
        expected_key: "accomplishments",
        parser: ParserTag::List,
        prompt_doc: ACCOMPLISHMENTS_PROMPT,
    },
    Generator {
        kind: SectionKind::Frustrations,
        expected_key: "frustrations",
        parser: ParserTag::List,
        prompt_doc: FRUSTRATIONS_PROMPT,
    },
    Generator {
        kind: SectionKind::ToneMood,
        expected_key: "tone_mood",
        parser: ParserTag::ToneMood,
        prompt_doc: TONE_MOOD_PROMPT,
    },
    Generator {
        kind: SectionKind::DiscussionNotes,
        expected_key: "discussion_notes",
        parser: ParserTag::List,
        prompt_doc: DISCUSSION_NOTES_PROMPT,
    },
    Generator {
        kind: SectionKind::CommitMetadata,
        expected_key: "commit_metadata",
        parser: ParserTag::MetadataMap,
        prompt_doc: COMMIT_METADATA_PROMPT,
    },
];

/// The fixed generator set, in generation order.
pub fn registry() -> &'static [Generator; 7] {
    &REGISTRY
}

/// Look up a generator by section kind.
pub fn generator_for(kind: SectionKind) -> &'static Generator {
    REGISTRY
        .iter()
        .find(|g| g.kind == kind)
        .expect("every section kind is registered")
}
