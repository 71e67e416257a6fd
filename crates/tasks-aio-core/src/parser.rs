//! Line parser turning markdown list items into [`Task`] records.
//!
//! Four metadata dialects are understood on the same line:
//!
//! * hashtags (`#tag`), collected but left in the text,
//! * dataview fields (`[key:: value]`, also the `[[key:: value]]` spelling),
//! * classic annotations (`@key(value)` and bare `@key`),
//! * Tasks-plugin icons (`📅 2024-01-15`, `⏳`, `🛫`, `✅`, and the priority icons),
//!
//! plus an inline time range (`09:00-10:30`) and wikilink dates (`[[2024-01-15]]`).
//! Unrecognized or malformed metadata stays in the text; parsing never fails.

use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

use crate::task::{AttributeValue, Attributes, Priority, Task, date_part};

#[allow(clippy::expect_used)]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern must compile")
}

static CHECKBOX_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*[-*]\s+\[(.)\]\s+(.*)$"));
static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\s*[-*]\s+(.*)$"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"#([^\s#]+)"));
static DATAVIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\[\[([^\[\]:]+)::([^\]]+)\]\]|\[([^\[\]:]+)::([^\]]+)\]")
});
static CLASSIC_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"@(\w+)(?:\(([^)]+)\))?"));
static TIME_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"([0-9]{1,2}:[0-9]{2})-([0-9]{1,2}:[0-9]{2})"));
static WIKILINK_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\[\[([0-9]{4}-[0-9]{2}-[0-9]{2})\]\]"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\s+"));

static DUE_ICON_RE: LazyLock<Regex> = LazyLock::new(|| icon_date_pattern("📅"));
static SCHEDULED_ICON_RE: LazyLock<Regex> = LazyLock::new(|| icon_date_pattern("⏳"));
static START_ICON_RE: LazyLock<Regex> = LazyLock::new(|| icon_date_pattern("🛫"));
static DONE_ICON_RE: LazyLock<Regex> = LazyLock::new(|| icon_date_pattern("✅"));

fn icon_date_pattern(icon: &str) -> Regex {
    pattern(&format!(r"{icon}\x{{FE0F}}?\s*([0-9]{{4}}-[0-9]{{2}}-[0-9]{{2}})"))
}

/// Location of a line inside a document.
#[derive(Debug, Clone, Copy)]
pub struct TaskLocation<'a> {
    /// Document path.
    pub path: &'a str,
    /// Zero-based line index.
    pub line: usize,
}

/// Stateless apart from the set of status symbols that count as completed.
#[derive(Debug, Clone)]
pub struct TaskParser {
    completed_symbols: HashSet<char>,
}

impl Default for TaskParser {
    fn default() -> Self {
        Self {
            completed_symbols: ['x', 'X'].into_iter().collect(),
        }
    }
}

impl TaskParser {
    /// Parser with the default completed symbols (`x` and `X`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with an explicit completed-symbol set.
    #[must_use]
    pub fn with_completed_symbols(symbols: impl IntoIterator<Item = char>) -> Self {
        let mut parser = Self::default();
        parser.set_completed_symbols(symbols);
        parser
    }

    /// Replace the completed-symbol set.
    pub fn set_completed_symbols(&mut self, symbols: impl IntoIterator<Item = char>) {
        self.completed_symbols = symbols.into_iter().collect();
    }

    /// Symbols currently treated as completed.
    #[must_use]
    pub const fn completed_symbols(&self) -> &HashSet<char> {
        &self.completed_symbols
    }

    /// Whether a raw checkbox status counts as completed.
    #[must_use]
    pub fn is_completed_status(&self, status: &str) -> bool {
        status
            .chars()
            .next()
            .is_some_and(|symbol| self.completed_symbols.contains(&symbol))
    }

    /// Parse every line of a document, keeping the task-like ones.
    #[must_use]
    pub fn parse_document(&self, path: &str, content: &str) -> Vec<Task> {
        content
            .lines()
            .enumerate()
            .filter_map(|(line, text)| self.parse(text, Some(TaskLocation { path, line })))
            .collect()
    }

    /// Parse a single line. Returns `None` unless the line is a checkbox or a
    /// bulleted list item.
    #[must_use]
    pub fn parse(&self, line: &str, location: Option<TaskLocation<'_>>) -> Option<Task> {
        let (status, content) = if let Some(caps) = CHECKBOX_RE.captures(line) {
            (Some(caps[1].to_owned()), caps[2].to_owned())
        } else {
            let caps = LIST_ITEM_RE.captures(line)?;
            (None, caps[1].to_owned())
        };

        let is_task = status.is_some();
        let status = status.unwrap_or_default();
        let completed = is_task && self.is_completed_status(&status);

        let mut attributes = Attributes::new();
        let tags = collect_tags(&content);
        let text = strip_dataview_fields(&content, &mut attributes);
        let mut text = strip_classic_annotations(&text, &mut attributes);

        let mut due = promoted_date(&attributes, "due");
        let mut scheduled = promoted_date(&attributes, "scheduled");
        let mut start = promoted_date(&attributes, "start");
        let mut completed_date = promoted_date(&attributes, "completed");

        let time_range = take_time_range(&mut text);

        let icon_fields: [(&mut Option<String>, &str, &Regex); 4] = [
            (&mut due, "due", &DUE_ICON_RE),
            (&mut scheduled, "scheduled", &SCHEDULED_ICON_RE),
            (&mut start, "start", &START_ICON_RE),
            (&mut completed_date, "completed", &DONE_ICON_RE),
        ];
        for (field, key, regex) in icon_fields {
            if field.is_none()
                && let Some(date) = take_icon_date(&mut text, regex)
            {
                attributes.insert(key.to_owned(), AttributeValue::from(date.as_str()));
                *field = Some(date);
            }
        }

        let mut end = None;
        if let Some(range) = &time_range
            && let Some(date) = due.as_deref().map(|value| date_part(value).to_owned())
        {
            end = Some(format!("{date}T{}:00", range.end));
            due = Some(format!("{date}T{}:00", range.start));
        }

        let priority = take_priority(&mut text, &mut attributes);

        if due.is_none()
            && let Some(date) = WIKILINK_DATE_RE
                .captures_iter(&text)
                .map(|caps| caps[1].to_owned())
                .find(|date| is_calendar_date(date))
        {
            attributes.insert("due".to_owned(), AttributeValue::from(date.as_str()));
            due = Some(date);
        }

        let text = WHITESPACE_RE.replace_all(&text, " ").trim().to_owned();

        let (id, file, line_index) = match location {
            Some(TaskLocation { path, line }) => (format!("{path}:{line}"), Some(path.to_owned()), Some(line)),
            None => {
                let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
                (format!("unknown:{millis}"), None, None)
            }
        };

        Some(Task {
            id,
            text,
            original_text: line.to_owned(),
            status,
            completed,
            is_task,
            priority,
            due,
            end,
            scheduled,
            start,
            completed_date,
            tags,
            attributes,
            file,
            line: line_index,
        })
    }
}

struct TimeRange {
    start: String,
    end: String,
}

fn collect_tags(content: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in TAG_RE.captures_iter(content) {
        let tag = &caps[1];
        if !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_owned());
        }
    }
    tags
}

fn strip_dataview_fields(content: &str, attributes: &mut Attributes) -> String {
    let mut spans = Vec::new();
    for caps in DATAVIEW_RE.captures_iter(content) {
        let (Some(key), Some(value)) = (caps.get(1).or_else(|| caps.get(3)), caps.get(2).or_else(|| caps.get(4)))
        else {
            continue;
        };
        let key = key.as_str().trim();
        if key.is_empty() {
            continue;
        }
        attributes.insert(key.to_owned(), AttributeValue::from(value.as_str().trim()));
        if let Some(whole) = caps.get(0) {
            spans.push(whole.range());
        }
    }
    excise(content, &spans)
}

fn strip_classic_annotations(content: &str, attributes: &mut Attributes) -> String {
    let mut spans = Vec::new();
    for caps in CLASSIC_RE.captures_iter(content) {
        let key = caps[1].to_owned();
        let value = caps
            .get(2)
            .map_or(AttributeValue::Flag(true), |value| AttributeValue::from(value.as_str().trim()));
        attributes.insert(key, value);
        if let Some(whole) = caps.get(0) {
            spans.push(whole.range());
        }
    }
    excise(content, &spans)
}

fn promoted_date(attributes: &Attributes, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(AttributeValue::as_text)
        .filter(|value| is_calendar_date(value))
        .map(str::to_owned)
}

fn take_time_range(text: &mut String) -> Option<TimeRange> {
    let caps = TIME_RANGE_RE.captures(text)?;
    let start = normalize_time(&caps[1])?;
    let end = normalize_time(&caps[2])?;
    let span = caps.get(0)?.range();
    *text = excise(text, &[span]);
    Some(TimeRange { start, end })
}

fn take_icon_date(text: &mut String, regex: &Regex) -> Option<String> {
    let caps = regex.captures(text)?;
    let date = caps[1].to_owned();
    if !is_calendar_date(&date) {
        return None;
    }
    let span = caps.get(0)?.range();
    *text = excise(text, &[span]);
    Some(date)
}

fn take_priority(text: &mut String, attributes: &mut Attributes) -> Priority {
    let explicit = attributes
        .get("priority")
        .and_then(AttributeValue::as_text)
        .and_then(Priority::from_name);

    let mut priority = Priority::Normal;
    if let Some(&(icon, level)) = Priority::ICONS.iter().find(|(icon, _)| text.contains(icon)) {
        *text = text.replacen(icon, "", 1);
        priority = level;
    }

    match explicit {
        Some(level) => level,
        None => {
            if priority != Priority::Normal {
                attributes.insert("priority".to_owned(), AttributeValue::from(priority.as_str()));
            }
            priority
        }
    }
}

fn excise(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn is_calendar_date(value: &str) -> bool {
    value.len() == 10 && Date::parse(value, format_description!("[year]-[month]-[day]")).is_ok()
}

fn normalize_time(value: &str) -> Option<String> {
    let (hour, minute) = value.split_once(':')?;
    let hour: u8 = hour.parse().ok()?;
    let minute: u8 = minute.parse().ok()?;
    Time::from_hms(hour, minute, 0).ok()?;
    Some(format!("{hour:02}:{minute:02}"))
}
