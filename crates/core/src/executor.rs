// crates/core/src/executor.rs
//! AI function executor: prompt assembly, LM invocation, and robust
//! parsing of the response into a typed section result.
//!
//! Parsing is a small state machine keyed by the generator's parser
//! tag, always JSON-first with a text fallback. Model failures and
//! unparseable output degrade to the kind's typed default with an
//! error note — this path never panics and never raises.

use crate::generators::{Generator, ParserTag};
use crate::llm::{CompletionRequest, LlmProvider};
use commit_story_types::{
    DiscussionNote, JournalContext, SectionContent, SectionKind, SectionResult,
};
use serde_json::Value;
use tracing::debug;

/// Marker separating the prompt documentation from the JSON context.
const JSON_CONTEXT_MARKER: &str = "JSON_CONTEXT:";

/// Execute one generator against the journal context.
pub async fn execute_generator(
    generator: &Generator,
    context: &JournalContext,
    provider: &dyn LlmProvider,
) -> SectionResult {
    let context_json = match serde_json::to_string_pretty(context) {
        Ok(json) => json,
        Err(e) => {
            return SectionResult::fallback(
                generator.kind,
                format!("context serialization failed: {e}"),
            )
        }
    };

    let prompt = format!(
        "{}\n\n{JSON_CONTEXT_MARKER}\n{context_json}",
        generator.prompt_doc
    );

    let response = match provider.complete(CompletionRequest::new(prompt)).await {
        Ok(response) => response.text,
        Err(e) => {
            debug!("generator {} invocation failed: {e}", generator.kind.name());
            return SectionResult::fallback(generator.kind, format!("model invocation failed: {e}"));
        }
    };

    if response.trim().is_empty() {
        return SectionResult::fallback(generator.kind, "empty response from model");
    }

    parse_response(generator, &response)
}

/// Parse a raw model response by the generator's parser tag.
pub fn parse_response(generator: &Generator, response: &str) -> SectionResult {
    let raw = response.trim();
    // Fenced responses are unwrapped and parsed by the same rules;
    // a malformed fence falls back to the raw text.
    let candidate = unwrap_code_fence(raw).unwrap_or(raw);

    match generator.parser {
        ParserTag::Text => parse_text(generator, candidate),
        ParserTag::List => parse_list(generator, candidate),
        ParserTag::ToneMood => parse_tone_mood(candidate),
        ParserTag::MetadataMap => parse_metadata(generator, candidate),
    }
}

/// Unwrap a ```-fenced block with a `json`, `python`, or empty tag.
/// Returns `None` (use the raw text) for unfenced input, unknown tags,
/// and fences that never close.
fn unwrap_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let newline = rest.find('\n')?;
    let tag = rest[..newline].trim();
    if !matches!(tag, "" | "json" | "python") {
        return None;
    }
    let body = &rest[newline + 1..];
    let close = body.rfind("```")?;
    Some(body[..close].trim())
}

/// The expected key's value inside a parsed JSON object, if present.
fn keyed_value<'a>(parsed: &'a Value, key: &str) -> Option<&'a Value> {
    parsed.as_object()?.get(key)
}

fn parse_text(generator: &Generator, candidate: &str) -> SectionResult {
    if let Ok(parsed) = serde_json::from_str::<Value>(candidate) {
        if let Some(Value::String(text)) = keyed_value(&parsed, generator.expected_key) {
            return SectionResult::ok(text_content(generator.kind, text.clone()));
        }
    }
    // Not JSON (or JSON without the key): the raw text is the section.
    SectionResult::ok(text_content(generator.kind, candidate.to_string()))
}

fn text_content(kind: SectionKind, text: String) -> SectionContent {
    match kind {
        SectionKind::Summary => SectionContent::Summary { text },
        SectionKind::TechnicalSynopsis => SectionContent::TechnicalSynopsis { text },
        other => unreachable!("text parser registered for non-text section {other:?}"),
    }
}

fn parse_list(generator: &Generator, candidate: &str) -> SectionResult {
    if let Ok(parsed) = serde_json::from_str::<Value>(candidate) {
        if let Some(Value::Array(items)) = keyed_value(&parsed, generator.expected_key) {
            return SectionResult::ok(list_content(generator.kind, items));
        }
    }

    // Newline fallback: trim, strip bullets, drop empties.
    let lines: Vec<String> = candidate
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("- ")
                .trim_start_matches("* ")
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect();

    let content = match generator.kind {
        SectionKind::DiscussionNotes => SectionContent::DiscussionNotes {
            items: lines
                .into_iter()
                .map(|text| DiscussionNote {
                    speaker: None,
                    text,
                })
                .collect(),
        },
        SectionKind::Accomplishments => SectionContent::Accomplishments { items: lines },
        SectionKind::Frustrations => SectionContent::Frustrations { items: lines },
        other => unreachable!("list parser registered for non-list section {other:?}"),
    };
    SectionResult::ok(content)
}

fn list_content(kind: SectionKind, items: &[Value]) -> SectionContent {
    match kind {
        SectionKind::DiscussionNotes => SectionContent::DiscussionNotes {
            items: items.iter().filter_map(discussion_note).collect(),
        },
        SectionKind::Accomplishments => SectionContent::Accomplishments {
            items: items.iter().filter_map(value_to_line).collect(),
        },
        SectionKind::Frustrations => SectionContent::Frustrations {
            items: items.iter().filter_map(value_to_line).collect(),
        },
        other => unreachable!("list parser registered for non-list section {other:?}"),
    }
}

fn value_to_line(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Discussion items may be plain strings or `{speaker, text}` objects.
fn discussion_note(value: &Value) -> Option<DiscussionNote> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| DiscussionNote {
                speaker: None,
                text: trimmed.to_string(),
            })
        }
        Value::Object(obj) => {
            let text = obj.get("text")?.as_str()?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(DiscussionNote {
                speaker: obj
                    .get("speaker")
                    .and_then(Value::as_str)
                    .map(String::from),
                text,
            })
        }
        _ => None,
    }
}

fn parse_tone_mood(candidate: &str) -> SectionResult {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(candidate) {
        let pick = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        return SectionResult::ok(SectionContent::ToneMood {
            mood: pick("mood"),
            indicators: pick("indicators"),
        });
    }

    // Labelled-line fallback: "Mood: …" / "Indicators: …".
    let labelled = |label: &str| {
        candidate.lines().find_map(|line| {
            let trimmed = line.trim();
            let rest = trimmed
                .strip_prefix(label)
                .or_else(|| trimmed.strip_prefix(&label.to_lowercase()))?;
            let value = rest.trim_start_matches(':').trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    };

    let mood = labelled("Mood");
    let indicators = labelled("Indicators");
    if mood.is_none() && indicators.is_none() {
        return SectionResult::fallback(SectionKind::ToneMood, "unparseable tone/mood response");
    }
    SectionResult::ok(SectionContent::ToneMood { mood, indicators })
}

fn parse_metadata(generator: &Generator, candidate: &str) -> SectionResult {
    let Ok(parsed) = serde_json::from_str::<Value>(candidate) else {
        return SectionResult::fallback(
            SectionKind::CommitMetadata,
            "non-JSON commit metadata response",
        );
    };

    // Accept both {"commit_metadata": {...}} and a bare object.
    let object = keyed_value(&parsed, generator.expected_key)
        .and_then(Value::as_object)
        .or_else(|| parsed.as_object());

    let Some(object) = object else {
        return SectionResult::fallback(
            SectionKind::CommitMetadata,
            "commit metadata response is not an object",
        );
    };

    let map = object
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();
    SectionResult::ok(SectionContent::CommitMetadata { map })
}
