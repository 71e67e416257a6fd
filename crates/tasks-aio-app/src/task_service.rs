//! Write-back edits to task lines.
//!
//! Edits go through the [`DocumentStore`], so a running [`crate::TaskCache`] picks
//! them up through the store's change notifications.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::{debug, info};

use crate::document_store::DocumentStore;
use crate::settings::{DateFormat, Settings, TimeFormat};

#[allow(clippy::expect_used)]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern compiles")
}

static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(\s*-\s*\[)(.)(\]\s*)"));
static CHECKBOX_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(\s*-\s*\[.\]\s*)"));
static LEADING_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^(\d{1,2}:\d{2}(?: [AP]M)?-\d{1,2}:\d{2}(?: [AP]M)?\s*)")
});
static EMOJI_DUE_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\s*📅\s*\d{4}-\d{2}-\d{2}"));
static DATAVIEW_DUE_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\s*\[due::\s*\d{4}-\d{2}-\d{2}\]"));

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const CLOCK_24H: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");
const CLOCK_12H: &[BorrowedFormatItem<'static>] =
    format_description!("[hour repr:12 padding:none]:[minute] [period]");

/// Rewrites individual task lines in place.
pub struct TaskService<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> TaskService<S> {
    /// Create a service writing through `store`.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Set the checkbox on `line` to `x` or a space.
    ///
    /// Returns `false` without writing when the document is missing, the line is out
    /// of range or the line has no checkbox.
    ///
    /// # Errors
    /// Returns an error when reading or writing the document fails.
    pub async fn toggle_task_completion(&self, path: &str, line: usize, completed: bool) -> Result<bool> {
        let status = if completed { "x" } else { " " };
        self.rewrite_line(path, line, |text| {
            STATUS_RE
                .is_match(text)
                .then(|| STATUS_RE.replace(text, format!("${{1}}{status}${{3}}")).into_owned())
        })
        .await
    }

    /// Reschedule the task on `line`: rewrite its leading time range (dropped for
    /// all-day tasks) and replace its due date using the configured dialects.
    ///
    /// Returns `false` without writing under the same conditions as
    /// [`Self::toggle_task_completion`].
    ///
    /// # Errors
    /// Returns an error when reading, writing or date formatting fails.
    pub async fn update_task_time(
        &self,
        path: &str,
        line: usize,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
        all_day: bool,
        settings: &Settings,
    ) -> Result<bool> {
        let time_range = format_time_range(start, end, settings.time_format)?;
        let due = format_due(start, settings.date_format)?;
        self.rewrite_line(path, line, |text| {
            reschedule_line(text, &time_range, &due, all_day)
        })
        .await
    }

    async fn rewrite_line<F>(&self, path: &str, line: usize, edit: F) -> Result<bool>
    where
        F: FnOnce(&str) -> Option<String> + Send,
    {
        let Some(document) = self
            .store
            .document(path)
            .await
            .map_err(Into::into)
            .with_context(|| format!("Failed to resolve {path}"))?
        else {
            debug!(%path, "Skipping edit of missing document");
            return Ok(false);
        };
        let content = self
            .store
            .read(&document.path)
            .await
            .map_err(Into::into)
            .with_context(|| format!("Failed to read {path}"))?;

        let mut lines: Vec<&str> = content.split('\n').collect();
        let Some(replacement) = lines.get(line).and_then(|text| edit(text)) else {
            debug!(%path, line, "Line is not an editable task");
            return Ok(false);
        };
        lines[line] = &replacement;

        self.store
            .write(&document.path, &lines.join("\n"))
            .await
            .map_err(Into::into)
            .with_context(|| format!("Failed to write {path}"))?;
        info!(%path, line, "Rewrote task line");
        Ok(true)
    }
}

fn format_time_range(start: PrimitiveDateTime, end: PrimitiveDateTime, format: TimeFormat) -> Result<String> {
    let clock = match format {
        TimeFormat::TwentyFourHour => CLOCK_24H,
        TimeFormat::TwelveHour => CLOCK_12H,
    };
    Ok(format!("{}-{}", start.format(clock)?, end.format(clock)?))
}

fn format_due(start: PrimitiveDateTime, format: DateFormat) -> Result<String> {
    let date = start.format(DATE)?;
    Ok(match format {
        DateFormat::Emoji => format!("📅 {date}"),
        DateFormat::Dataview => format!("[due:: {date}]"),
        DateFormat::Wikilink => format!("[[{date}]]"),
    })
}

/// Rebuild one checkbox line with a new time range and due date.
fn reschedule_line(text: &str, time_range: &str, due: &str, all_day: bool) -> Option<String> {
    let prefix_len = CHECKBOX_PREFIX_RE.find(text)?.end();
    let (prefix, body) = text.split_at(prefix_len);

    let body = if all_day {
        LEADING_TIME_RE.replace(body, "").into_owned()
    } else if LEADING_TIME_RE.is_match(body) {
        LEADING_TIME_RE
            .replace(body, format!("{time_range} ").as_str())
            .into_owned()
    } else {
        format!("{time_range} {body}")
    };
    let body = EMOJI_DUE_RE.replace(&body, "");
    let body = DATAVIEW_DUE_RE.replace(&body, "");

    Some(format!("{prefix}{} {due}", body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn reschedule_inserts_time_and_due() {
        let line = reschedule_line("- [ ] Standup", "09:00-09:15", "📅 2024-03-01", false);
        assert_eq!(line.as_deref(), Some("- [ ] 09:00-09:15 Standup 📅 2024-03-01"));
    }

    #[test]
    fn reschedule_replaces_existing_time_and_dates() {
        let line = reschedule_line(
            "  - [/] 8:00 AM-9:00 AM Review 📅 2024-01-01 #work [due:: 2024-01-02]",
            "10:00-11:30",
            "[due:: 2024-03-01]",
            false,
        );
        assert_eq!(
            line.as_deref(),
            Some("  - [/] 10:00-11:30 Review #work [due:: 2024-03-01]")
        );
    }

    #[test]
    fn all_day_drops_time_range() {
        let line = reschedule_line("- [ ] 09:00-10:00 Offsite", "09:00-10:00", "[[2024-03-01]]", true);
        assert_eq!(line.as_deref(), Some("- [ ] Offsite [[2024-03-01]]"));
    }

    #[test]
    fn reschedule_ignores_non_checkbox_lines() {
        assert_eq!(reschedule_line("plain text", "09:00-10:00", "📅 2024-03-01", false), None);
        assert_eq!(reschedule_line("* [ ] star bullet", "09:00-10:00", "📅 2024-03-01", false), None);
    }

    #[test]
    fn formats_follow_settings() {
        let start = datetime!(2024-03-01 13:05);
        let end = datetime!(2024-03-01 14:30);
        assert_eq!(
            format_time_range(start, end, TimeFormat::TwelveHour).ok().as_deref(),
            Some("1:05 PM-2:30 PM")
        );
        assert_eq!(
            format_time_range(start, end, TimeFormat::TwentyFourHour).ok().as_deref(),
            Some("13:05-14:30")
        );
        assert_eq!(format_due(start, DateFormat::Emoji).ok().as_deref(), Some("📅 2024-03-01"));
        assert_eq!(format_due(start, DateFormat::Wikilink).ok().as_deref(), Some("[[2024-03-01]]"));
    }
}
