// crates/core/src/journal_files.rs
//! Journal file conventions and recent-entry lookups.
//!
//! Daily entries live at `<journal>/daily/YYYY-MM-DD-journal.md`;
//! daily summaries at `<journal>/summaries/daily/YYYY-MM-DD-daily.md`.
//! Entries within a file are separated by a `---` rule.

use chrono::NaiveDate;
use commit_story_types::RecentJournalContext;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cap on how much prior-entry text is surfaced to generators.
const RECENT_ENTRY_CAP: usize = 4000;

/// Separator written between entries in a daily file.
const ENTRY_SEPARATOR: &str = "\n---\n";

pub fn daily_entry_path(journal_root: &Path, date: NaiveDate) -> PathBuf {
    journal_root
        .join("daily")
        .join(format!("{}-journal.md", date.format("%Y-%m-%d")))
}

pub fn daily_summary_path(journal_root: &Path, date: NaiveDate) -> PathBuf {
    journal_root
        .join("summaries")
        .join("daily")
        .join(format!("{}-daily.md", date.format("%Y-%m-%d")))
}

/// Append an entry, creating parent directories as needed. A non-empty
/// existing file gets a horizontal rule before the new entry.
pub fn append_entry(path: &Path, entry_markdown: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let existing_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut content = String::new();
    if existing_len > 0 {
        content.push_str(ENTRY_SEPARATOR);
    }
    content.push_str(entry_markdown);

    use std::io::Write;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())
}

/// Parse the date out of a `YYYY-MM-DD-journal.md` filename.
pub fn date_from_journal_filename(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix("-journal.md")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// The newest journal file dated strictly before `before`, if any.
pub fn latest_entry_before(journal_root: &Path, before: NaiveDate) -> Option<(NaiveDate, PathBuf)> {
    let daily_dir = journal_root.join("daily");
    let entries = fs::read_dir(&daily_dir).ok()?;

    entries
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let date = date_from_journal_filename(&name)?;
            (date < before).then(|| (date, entry.path()))
        })
        .max_by_key(|(date, _)| *date)
}

/// Collect the recent-journal slice of the context: the last entry of
/// the newest prior journal file, capped, plus that file's entry
/// headers as additional orientation.
pub fn collect_recent_journal_context(
    journal_root: &Path,
    current_date: NaiveDate,
) -> RecentJournalContext {
    let Some((date, path)) = latest_entry_before(journal_root, current_date) else {
        debug!("no prior journal entries under {}", journal_root.display());
        return RecentJournalContext::default();
    };

    let Ok(text) = fs::read_to_string(&path) else {
        debug!("prior journal file unreadable: {}", path.display());
        return RecentJournalContext::default();
    };

    let last_entry = text
        .split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .last()
        .unwrap_or("")
        .to_string();

    let mut latest_entry = last_entry;
    if latest_entry.len() > RECENT_ENTRY_CAP {
        // Truncate on a char boundary.
        let mut cut = RECENT_ENTRY_CAP;
        while !latest_entry.is_char_boundary(cut) {
            cut -= 1;
        }
        latest_entry.truncate(cut);
    }

    let additional_context: Vec<String> = std::iter::once(format!("previous journal date: {date}"))
        .chain(
            text.lines()
                .filter(|line| line.starts_with("### "))
                .map(String::from),
        )
        .collect();

    RecentJournalContext {
        latest_entry: (!latest_entry.is_empty()).then_some(latest_entry),
        additional_context,
    }
}
