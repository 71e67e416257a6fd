//! Domain types and the line parser for the markdown task index.

/// Document handles, front matter and change notifications.
pub mod document;
/// Queries over indexed tasks.
pub mod filter;
/// Line-to-task parser.
pub mod parser;
/// Task record.
pub mod task;

pub use document::{Document, DocumentEvent, Frontmatter, MARKDOWN_EXTENSION};
pub use filter::{TaskFilter, TextMatcher};
pub use parser::{TaskLocation, TaskParser};
pub use task::{AttributeValue, Attributes, Priority, Task};
