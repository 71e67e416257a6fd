use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Priority level attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// `🔺`
    Highest,
    /// `⏫`
    High,
    /// `🔼`
    Medium,
    /// No explicit priority.
    #[default]
    Normal,
    /// `🔽`
    Low,
    /// `⏬`
    Lowest,
}

impl Priority {
    /// Icon-bearing levels in scan order. The first icon present on a line wins.
    pub const ICONS: [(&'static str, Self); 5] = [
        ("🔺", Self::Highest),
        ("⏫", Self::High),
        ("🔼", Self::Medium),
        ("🔽", Self::Low),
        ("⏬", Self::Lowest),
    ];

    /// Wire name used in attributes and the persisted index.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Lowest => "lowest",
        }
    }

    /// Resolve one of the five explicit level names. `normal` is not an explicit level.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ICONS
            .iter()
            .map(|&(_, level)| level)
            .find(|level| level.as_str() == name)
    }

    /// Resolve a priority icon.
    #[must_use]
    pub fn from_icon(icon: &str) -> Option<Self> {
        Self::ICONS
            .iter()
            .find(|&&(candidate, _)| candidate == icon)
            .map(|&(_, level)| level)
    }

    /// Icon representing this level, if any.
    #[must_use]
    pub fn icon(self) -> Option<&'static str> {
        Self::ICONS
            .iter()
            .find(|&&(_, level)| level == self)
            .map(|&(icon, _)| icon)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of an inline metadata attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Bare `@key` annotation.
    Flag(bool),
    /// `[key:: value]`, `@key(value)` or a promoted date/priority.
    Text(String),
}

impl AttributeValue {
    /// Text payload, if this is not a bare flag.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Flag(_) => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Inline attributes keyed by name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Structured record derived from a single checkbox or list-item line.
///
/// Records are rebuilt from scratch whenever their document is re-indexed; the
/// `id` embeds the document path and line index, so it shifts when lines are
/// inserted or removed above the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// `<path>:<line>` identity.
    pub id: String,
    /// Display text with recognized metadata removed and whitespace collapsed.
    pub text: String,
    /// Unmodified source line.
    pub original_text: String,
    /// Raw checkbox status character; empty for plain list items.
    pub status: String,
    /// Whether the status is one of the configured completed symbols.
    pub completed: bool,
    /// `true` for checkbox lines, `false` for plain list items.
    pub is_task: bool,
    /// Priority level.
    #[serde(default)]
    pub priority: Priority,
    /// Due date (`YYYY-MM-DD`), extended with a time when a range is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    /// End timestamp derived from a time range on a dated task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Scheduled date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<String>,
    /// Start date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Completion date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<String>,
    /// Tag names in order of first appearance, without `#`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Every recognized inline attribute.
    #[serde(default)]
    pub attributes: Attributes,
    /// Path of the owning document.
    #[serde(default, rename = "filePath", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Zero-based line index inside the owning document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Task {
    /// Inbox tasks carry neither a due date nor an explicit priority.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.due.is_none() && self.priority == Priority::Normal
    }

    /// Calendar-date part of `due`.
    #[must_use]
    pub fn due_date(&self) -> Option<&str> {
        self.due.as_deref().map(date_part)
    }

    /// Leading whitespace of the source line, used to rebuild list hierarchy.
    #[must_use]
    pub fn indent(&self) -> &str {
        let trimmed = self.original_text.trim_start();
        &self.original_text[..self.original_text.len() - trimmed.len()]
    }
}

/// `YYYY-MM-DD` prefix of a date or timestamp string.
pub(crate) fn date_part(value: &str) -> &str {
    value.split_once('T').map_or(value, |(date, _)| date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task {
            id: "Daily.md:3".into(),
            text: "Write report".into(),
            original_text: "    - [ ] Write report".into(),
            status: " ".into(),
            completed: false,
            is_task: true,
            priority: Priority::Normal,
            due: None,
            end: None,
            scheduled: None,
            start: None,
            completed_date: None,
            tags: Vec::new(),
            attributes: Attributes::new(),
            file: Some("Daily.md".into()),
            line: Some(3),
        }
    }

    #[test]
    fn priority_names_and_icons_resolve() {
        assert_eq!(Priority::from_name("high"), Some(Priority::High));
        assert_eq!(Priority::from_name("normal"), None);
        assert_eq!(Priority::from_name("High"), None);
        assert_eq!(Priority::from_icon("⏬"), Some(Priority::Lowest));
        assert_eq!(Priority::Medium.icon(), Some("🔼"));
        assert_eq!(Priority::Normal.icon(), None);
    }

    #[test]
    fn inbox_requires_no_due_and_normal_priority() {
        let mut task = sample();
        assert!(task.is_inbox());

        task.priority = Priority::Low;
        assert!(!task.is_inbox());

        task.priority = Priority::Normal;
        task.due = Some("2024-03-01T09:00:00".into());
        assert!(!task.is_inbox());
        assert_eq!(task.due_date(), Some("2024-03-01"));
    }

    #[test]
    fn indent_reports_leading_whitespace() {
        assert_eq!(sample().indent(), "    ");
    }

    #[test]
    fn serializes_with_file_path_and_camel_case() {
        let mut task = sample();
        task.attributes.insert("phone".into(), "555".into());
        task.attributes.insert("home".into(), true.into());

        let value = serde_json::to_value(&task).unwrap_or_else(|err| panic!("serialize: {err}"));
        assert_eq!(value["filePath"], "Daily.md");
        assert_eq!(value["originalText"], "    - [ ] Write report");
        assert_eq!(value["isTask"], true);
        assert_eq!(value["priority"], "normal");
        assert_eq!(value["attributes"]["home"], true);
        assert!(value.get("due").is_none());

        let back: Task = serde_json::from_value(value).unwrap_or_else(|err| panic!("deserialize: {err}"));
        assert_eq!(back, task);
    }
}
