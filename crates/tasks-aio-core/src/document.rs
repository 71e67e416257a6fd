use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extension of documents that carry tasks.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Handle to a document owned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    /// Store-relative path with `/` separators.
    pub path: String,
    /// Last modification time in epoch milliseconds.
    pub mtime: i64,
}

impl Document {
    /// Create a handle.
    pub fn new(path: impl Into<String>, mtime: i64) -> Self {
        Self {
            path: path.into(),
            mtime,
        }
    }

    /// File name including extension.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit_once('/').map_or(self.path.as_str(), |(_, name)| name)
    }

    /// Extension without the dot; empty when there is none.
    #[must_use]
    pub fn extension(&self) -> &str {
        let name = self.name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext,
            _ => "",
        }
    }

    /// Whether the document is markdown text.
    #[must_use]
    pub fn is_markdown(&self) -> bool {
        self.extension() == MARKDOWN_EXTENSION
    }
}

/// Structured front-matter properties of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frontmatter(Map<String, Value>);

impl Frontmatter {
    /// Wrap a property map.
    #[must_use]
    pub const fn new(properties: Map<String, Value>) -> Self {
        Self(properties)
    }

    /// Build from a JSON value; anything but an object yields no properties.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Look up a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the property is present (with any value, including null).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Change notification published by a document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// Content changed; `content` carries the new text when the store already has it.
    Changed {
        /// Changed document.
        document: Document,
        /// Freshly written content, if known.
        content: Option<String>,
    },
    /// Document removed.
    Deleted {
        /// Path the document had.
        path: String,
    },
    /// Document moved.
    Renamed {
        /// Document at its new location.
        document: Document,
        /// Previous path.
        old_path: String,
    },
}
