use std::{
    collections::{BTreeSet, HashSet},
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory inside the vault holding configuration and the persisted index.
pub const CONFIG_DIR: &str = ".tasks-aio";
const CONFIG_FILE: &str = "config.toml";

/// Errors raised while loading or validating [`Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Configuration file exists but cannot be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Configuration file is not valid TOML for [`Settings`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
    /// Status symbol is not exactly one character.
    #[error("status symbol must be a single character: {0:?}")]
    InvalidSymbol(String),
    /// Two statuses share the same symbol.
    #[error("duplicate status symbol detected: {0:?}")]
    DuplicateSymbol(String),
    /// A filter list contains a blank entry, which would match every document.
    #[error("{0} must not contain blank entries")]
    BlankFilterEntry(&'static str),
}

/// Checkbox status known to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDefinition {
    /// Character between the brackets.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Tasks with this status count as completed.
    #[serde(default)]
    pub completed: bool,
}

impl StatusDefinition {
    fn builtin(symbol: &str, name: &str, color: &str, completed: bool) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            color: Some(color.into()),
            completed,
        }
    }
}

/// Dialect used when writing a due date back into a task line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// `📅 2024-01-15`
    #[default]
    Emoji,
    /// `[due:: 2024-01-15]`
    Dataview,
    /// `[[2024-01-15]]`
    Wikilink,
}

/// Clock used when writing a time range back into a task line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    /// `09:00-10:30`
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
    /// `9:00 AM-10:30 AM`
    #[serde(rename = "12h")]
    TwelveHour,
}

/// Indexing and write-back configuration loaded from `.tasks-aio/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// When non-empty, only documents under this prefix are indexed.
    pub inbox_folder: String,
    /// Path prefixes that are never indexed.
    pub excluded_folders: Vec<String>,
    /// Substrings of file names that are never indexed.
    pub excluded_files: Vec<String>,
    /// Front-matter rules, either `key` or `key: value`.
    pub excluded_properties: Vec<String>,
    /// Known checkbox statuses.
    pub custom_statuses: Vec<StatusDefinition>,
    /// Due-date dialect for write-back.
    pub date_format: DateFormat,
    /// Clock for write-back.
    pub time_format: TimeFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inbox_folder: String::new(),
            excluded_folders: vec!["Templates".into(), "Archive".into()],
            excluded_files: Vec::new(),
            excluded_properties: Vec::new(),
            custom_statuses: vec![
                StatusDefinition::builtin("x", "Completed", "#10b981", true),
                StatusDefinition::builtin("/", "In Progress", "#f59e0b", false),
                StatusDefinition::builtin("-", "Cancelled", "#9ca3af", true),
                StatusDefinition::builtin(">", "Deferred", "#8b5cf6", false),
                StatusDefinition::builtin("!", "Important", "#ef4444", false),
                StatusDefinition::builtin("?", "Question", "#f97316", false),
            ],
            date_format: DateFormat::default(),
            time_format: TimeFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings for the vault rooted at `root`. A missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, SettingsError> {
        Self::from_file(root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load settings from an explicit file path. A missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check status symbols and filter lists.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.ensure_unique_statuses()?;
        for (field, entries) in [
            ("excluded_folders", &self.excluded_folders),
            ("excluded_files", &self.excluded_files),
            ("excluded_properties", &self.excluded_properties),
        ] {
            if entries.iter().any(|entry| entry.trim().is_empty()) {
                return Err(SettingsError::BlankFilterEntry(field));
            }
        }
        Ok(())
    }

    /// Status characters counted as completed. `X` joins whenever `x` is present.
    #[must_use]
    pub fn completed_symbols(&self) -> BTreeSet<char> {
        let mut symbols: BTreeSet<char> = self
            .custom_statuses
            .iter()
            .filter(|status| status.completed)
            .filter_map(|status| status.symbol.chars().next())
            .collect();
        if symbols.contains(&'x') {
            symbols.insert('X');
        }
        symbols
    }

    fn ensure_unique_statuses(&self) -> Result<(), SettingsError> {
        let mut seen = HashSet::new();
        for status in &self.custom_statuses {
            if status.symbol.chars().count() != 1 {
                return Err(SettingsError::InvalidSymbol(status.symbol.clone()));
            }
            if !seen.insert(status.symbol.as_str()) {
                return Err(SettingsError::DuplicateSymbol(status.symbol.clone()));
            }
        }
        Ok(())
    }
}
