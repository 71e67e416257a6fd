use crate::task::Task;

/// Case-insensitive substring matcher for task text and tags.
#[derive(Debug, Clone)]
pub struct TextMatcher {
    needle: String,
}

impl TextMatcher {
    /// Normalize a query string into a matcher. Returns `None` for blank inputs.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            needle: trimmed.to_lowercase(),
        })
    }

    /// Determine whether the text or any tag contains the query.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_field(&task.text) || task.tags.iter().any(|tag| self.matches_field(tag))
    }

    fn matches_field(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }
}

/// Query over indexed tasks. Empty fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Free-text query over text and tags.
    pub text: Option<String>,
    /// Tags that must all be present (without `#`).
    pub tags: Vec<String>,
    /// Keep completed tasks.
    pub include_completed: bool,
    /// Keep plain list items that have no checkbox.
    pub include_list_items: bool,
    /// Only tasks due on or after this `YYYY-MM-DD` date.
    pub due_from: Option<String>,
    /// Only tasks due on or before this `YYYY-MM-DD` date.
    pub due_until: Option<String>,
    /// Only tasks from documents under this path prefix.
    pub path_prefix: Option<String>,
    /// Only inbox tasks (no due date, normal priority).
    pub inbox_only: bool,
}

impl TaskFilter {
    /// Check whether a task satisfies every configured clause.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if !self.include_list_items && !task.is_task {
            return false;
        }
        if !self.include_completed && task.completed {
            return false;
        }
        if self.inbox_only && !task.is_inbox() {
            return false;
        }
        if !self.tags.iter().all(|tag| task.tags.contains(tag)) {
            return false;
        }
        if let Some(prefix) = &self.path_prefix
            && !task.file.as_deref().is_some_and(|file| file.starts_with(prefix.as_str()))
        {
            return false;
        }
        if self.due_from.is_some() || self.due_until.is_some() {
            // Plain `YYYY-MM-DD` strings order lexicographically.
            let Some(due) = task.due_date() else {
                return false;
            };
            if self.due_from.as_deref().is_some_and(|from| due < from) {
                return false;
            }
            if self.due_until.as_deref().is_some_and(|until| due > until) {
                return false;
            }
        }
        self.text
            .as_deref()
            .and_then(TextMatcher::new)
            .is_none_or(|matcher| matcher.matches(task))
    }
}
