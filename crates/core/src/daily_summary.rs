// crates/core/src/daily_summary.rs
//! Daily-boundary detection for summary generation.
//!
//! The rule: when the newest prior journal file is dated strictly
//! earlier than the current commit's journal file and no summary exists
//! for that earlier date yet, that date needs a summary. Prior files
//! only need to exist — their content is never inspected, so corrupted
//! entries still trigger the boundary.

use crate::journal_files::{date_from_journal_filename, latest_entry_before};
use chrono::{Datelike, NaiveDate, Weekday};
use std::path::Path;
use tracing::debug;

/// Calendar-boundary flags for the higher-order summary cadences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodTriggers {
    pub weekly: bool,
    pub monthly: bool,
    pub quarterly: bool,
    pub yearly: bool,
}

/// Decide whether a daily summary is due, and for which date.
///
/// `current_journal_file` is the daily file the current commit's entry
/// lands in; `journal_root` is the journal directory holding `daily/`
/// and `summaries/`. Returns `None` when no boundary was crossed or a
/// summary already exists.
pub fn should_generate_daily_summary(
    current_journal_file: &Path,
    journal_root: &Path,
) -> Option<NaiveDate> {
    let current_name = current_journal_file.file_name()?.to_string_lossy();
    let current_date = date_from_journal_filename(&current_name)?;

    let (previous_date, _) = latest_entry_before(journal_root, current_date)?;
    if previous_date >= current_date {
        return None;
    }

    let summary_file = crate::journal_files::daily_summary_path(journal_root, previous_date);
    if summary_file.exists() {
        debug!("summary already exists for {previous_date}");
        return None;
    }

    Some(previous_date)
}

/// Calendar-boundary flags for `today` (`YYYY-MM-DD`): ISO-week Monday,
/// first of month, first of calendar quarter, first of year. An invalid
/// date returns all-false.
pub fn period_triggers(today: &str) -> PeriodTriggers {
    let Ok(date) = NaiveDate::parse_from_str(today, "%Y-%m-%d") else {
        return PeriodTriggers::default();
    };

    let first_of_month = date.day() == 1;
    PeriodTriggers {
        weekly: date.weekday() == Weekday::Mon,
        monthly: first_of_month,
        quarterly: first_of_month && matches!(date.month(), 1 | 4 | 7 | 10),
        yearly: first_of_month && date.month() == 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn setup(journal_files: &[&str], summary_files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let daily = dir.path().join("daily");
        fs::create_dir_all(&daily).unwrap();
        for name in journal_files {
            fs::write(daily.join(name), "entry").unwrap();
        }
        let summaries = dir.path().join("summaries").join("daily");
        fs::create_dir_all(&summaries).unwrap();
        for name in summary_files {
            fs::write(summaries.join(name), "summary").unwrap();
        }
        dir
    }

    #[test]
    fn test_boundary_detected() {
        let dir = setup(
            &["2025-01-05-journal.md", "2025-01-06-journal.md"],
            &[],
        );
        let current = dir.path().join("daily/2025-01-06-journal.md");

        let result = should_generate_daily_summary(&current, dir.path());
        assert_eq!(
            result,
            Some(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap())
        );
    }

    #[test]
    fn test_no_boundary_when_summary_exists() {
        let dir = setup(
            &["2025-01-05-journal.md", "2025-01-06-journal.md"],
            &["2025-01-05-daily.md"],
        );
        let current = dir.path().join("daily/2025-01-06-journal.md");

        assert_eq!(should_generate_daily_summary(&current, dir.path()), None);
    }

    #[test]
    fn test_no_boundary_without_prior_entries() {
        let dir = setup(&["2025-01-06-journal.md"], &[]);
        let current = dir.path().join("daily/2025-01-06-journal.md");

        assert_eq!(should_generate_daily_summary(&current, dir.path()), None);
    }

    #[test]
    fn test_corrupted_prior_file_still_triggers() {
        // Presence alone triggers the boundary; content is never read.
        let dir = setup(&["2025-01-06-journal.md"], &[]);
        fs::write(
            dir.path().join("daily/2025-01-04-journal.md"),
            [0xff, 0xfe, 0x00],
        )
        .unwrap();
        let current = dir.path().join("daily/2025-01-06-journal.md");

        let result = should_generate_daily_summary(&current, dir.path());
        assert_eq!(
            result,
            Some(NaiveDate::from_ymd_opt(2025, 1, 4).unwrap())
        );
    }

    #[test]
    fn test_unparseable_current_filename_is_none() {
        let dir = setup(&["2025-01-05-journal.md"], &[]);
        let current = dir.path().join("daily/notes.md");
        assert_eq!(should_generate_daily_summary(&current, dir.path()), None);
    }

    #[test]
    fn test_period_triggers_iso_week_monday() {
        // 2025-01-06 is a Monday.
        let triggers = period_triggers("2025-01-06");
        assert!(triggers.weekly);
        assert!(!triggers.monthly);
        assert!(!triggers.quarterly);
        assert!(!triggers.yearly);
    }

    #[test]
    fn test_period_triggers_quarter_and_year() {
        // 2025-01-01 is a Wednesday: month + quarter + year, no week.
        let triggers = period_triggers("2025-01-01");
        assert!(!triggers.weekly);
        assert!(triggers.monthly);
        assert!(triggers.quarterly);
        assert!(triggers.yearly);

        // 2025-04-01: quarter but not year.
        let triggers = period_triggers("2025-04-01");
        assert!(triggers.monthly);
        assert!(triggers.quarterly);
        assert!(!triggers.yearly);

        // 2025-02-01: month only.
        let triggers = period_triggers("2025-02-01");
        assert!(triggers.monthly);
        assert!(!triggers.quarterly);
    }

    #[test]
    fn test_period_triggers_invalid_date_all_false() {
        assert_eq!(period_triggers("not-a-date"), PeriodTriggers::default());
        assert_eq!(period_triggers("2025-13-40"), PeriodTriggers::default());
    }
}
