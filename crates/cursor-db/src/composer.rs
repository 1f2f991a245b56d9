// crates/cursor-db/src/composer.rs
//! Chat provider: session and bubble extraction for one database pair.
//!
//! Session metadata lives in the workspace database under a single
//! `ItemTable` key; message headers and bubble content live in the
//! global database's `cursorDiskKV` table. Sessions carry timestamps,
//! individual messages do not — every message inherits its session's
//! `createdAt`, and intra-session order comes from the header array.

use crate::query::{execute_query, value_to_text};
use commit_story_types::{ChatMessage, CursorDbError, MessageRole, SessionMeta, TimeWindow};
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Workspace-database key holding session metadata.
const SESSION_METADATA_KEY: &str = "composer.composerData";

/// Soft latency target; exceeding it is recorded, never enforced.
const SOFT_BUDGET_MS: u128 = 500;

const ITEM_TABLE_SQL: &str = "SELECT value FROM ItemTable WHERE key = ?";
const DISK_KV_SQL: &str = "SELECT value FROM cursorDiskKV WHERE key = ?";

#[derive(Debug, Deserialize)]
struct ComposerData {
    #[serde(rename = "allComposers", default)]
    all_composers: Vec<SessionMeta>,
}

#[derive(Debug, Deserialize)]
struct ConversationHeaders {
    #[serde(rename = "fullConversationHeadersOnly", default)]
    headers: Vec<MessageHeader>,
}

#[derive(Debug, Deserialize)]
struct MessageHeader {
    #[serde(rename = "bubbleId")]
    bubble_id: String,
    #[serde(rename = "type", default)]
    role_tag: i64,
}

#[derive(Debug, Deserialize)]
struct Bubble {
    #[serde(default)]
    text: String,
}

/// Extract every message whose session was created inside the window,
/// sorted by `(timestamp, composer_id, header_index)`.
///
/// Sessions are filtered by their own `createdAt` only — bubbles carry
/// no timestamps, so a session outside the window contributes nothing
/// and none of its bubbles are fetched. Missing bubble blobs are
/// skipped at debug level; malformed JSON in any blob is fatal for the
/// call.
pub fn chat_for_window(
    workspace_db: &Path,
    global_db: &Path,
    window: &TimeWindow,
) -> Result<Vec<ChatMessage>, CursorDbError> {
    let started = Instant::now();
    let span = tracing::info_span!(
        "chat_for_window",
        sessions_discovered = tracing::field::Empty,
        sessions_in_window = tracing::field::Empty,
        bubbles_fetched = tracing::field::Empty,
        bubbles_missing = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
        exceeded_500ms = tracing::field::Empty,
    );
    let _entered = span.enter();

    let sessions = load_sessions(workspace_db)?;
    let sessions_discovered = sessions.len();

    let in_window: Vec<&SessionMeta> = sessions
        .iter()
        .filter(|s| s.created_at.is_some_and(|t| window.contains(t)))
        .collect();
    let sessions_in_window = in_window.len();

    let mut bubbles_fetched = 0usize;
    let mut bubbles_missing = 0usize;

    // (timestamp, composer_id, header_index) is the total order; the
    // header index is needed because all messages in a session share
    // the session timestamp, and the composer id breaks ties between
    // sessions created in the same millisecond.
    let mut keyed: Vec<(i64, String, usize, ChatMessage)> = Vec::new();

    for session in in_window {
        let session_ts = session.created_at.expect("filtered on created_at");
        let session_name = session.name.clone().unwrap_or_default();

        for (header_index, header) in load_headers(global_db, &session.composer_id)?
            .into_iter()
            .enumerate()
        {
            let Some(role) = MessageRole::from_role_tag(header.role_tag) else {
                debug!(
                    "skipping bubble {} with unknown role tag {}",
                    header.bubble_id, header.role_tag
                );
                continue;
            };

            let key = format!("bubbleId:{}:{}", session.composer_id, header.bubble_id);
            let Some(bubble) = load_bubble(global_db, &key)? else {
                debug!("bubble blob missing for {key}");
                bubbles_missing += 1;
                continue;
            };
            bubbles_fetched += 1;

            keyed.push((
                session_ts,
                session.composer_id.clone(),
                header_index,
                ChatMessage {
                    role,
                    content: bubble.text,
                    timestamp_ms: session_ts,
                    composer_id: session.composer_id.clone(),
                    bubble_id: header.bubble_id,
                    session_name: session_name.clone(),
                },
            ));
        }
    }

    keyed.sort_by(|a, b| (a.0, &a.1, a.2).cmp(&(b.0, &b.1, b.2)));
    let messages: Vec<ChatMessage> = keyed.into_iter().map(|(_, _, _, m)| m).collect();

    let duration_ms = started.elapsed().as_millis();
    span.record("sessions_discovered", sessions_discovered);
    span.record("sessions_in_window", sessions_in_window);
    span.record("bubbles_fetched", bubbles_fetched);
    span.record("bubbles_missing", bubbles_missing);
    span.record("duration_ms", duration_ms as u64);
    span.record("exceeded_500ms", duration_ms > SOFT_BUDGET_MS);
    debug!(
        "chat extraction finished: {} messages in {duration_ms}ms",
        messages.len()
    );

    Ok(messages)
}

fn load_sessions(workspace_db: &Path) -> Result<Vec<SessionMeta>, CursorDbError> {
    let rows = execute_query(workspace_db, ITEM_TABLE_SQL, &[SESSION_METADATA_KEY])?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };
    let Some(text) = row.first().and_then(value_to_text) else {
        return Ok(Vec::new());
    };

    let data: ComposerData =
        serde_json::from_str(&text).map_err(|e| CursorDbError::MalformedData {
            key: SESSION_METADATA_KEY.to_string(),
            cause: e.to_string(),
        })?;
    Ok(data.all_composers)
}

fn load_headers(global_db: &Path, composer_id: &str) -> Result<Vec<MessageHeader>, CursorDbError> {
    let key = format!("composerData:{composer_id}");
    let rows = execute_query(global_db, DISK_KV_SQL, &[&key])?;
    let Some(text) = rows.first().and_then(|row| row.first()).and_then(value_to_text) else {
        debug!("no conversation headers for {key}");
        return Ok(Vec::new());
    };

    let data: ConversationHeaders =
        serde_json::from_str(&text).map_err(|e| CursorDbError::MalformedData {
            key,
            cause: e.to_string(),
        })?;
    Ok(data.headers)
}

fn load_bubble(global_db: &Path, key: &str) -> Result<Option<Bubble>, CursorDbError> {
    let rows = execute_query(global_db, DISK_KV_SQL, &[key])?;
    let Some(text) = rows.first().and_then(|row| row.first()).and_then(value_to_text) else {
        return Ok(None);
    };

    let bubble: Bubble = serde_json::from_str(&text).map_err(|e| CursorDbError::MalformedData {
        key: key.to_string(),
        cause: e.to_string(),
    })?;
    Ok(Some(bubble))
}
