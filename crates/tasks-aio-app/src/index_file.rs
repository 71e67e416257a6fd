//! Persisted task index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tasks_aio_core::Task;
use thiserror::Error;
use tokio::fs;

use crate::settings::CONFIG_DIR;

const INDEX_FILE: &str = "cache.json";

/// Errors raised while reading or writing the index file.
#[derive(Debug, Error)]
pub enum IndexFileError {
    /// No location was configured.
    #[error("index file path must not be empty")]
    EmptyPath,
    /// Filesystem access failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Index file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Content is not a valid index document.
    #[error("malformed index {path}: {source}")]
    Malformed {
        /// Index file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Indexed state of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Modification time of the document when it was indexed.
    pub mtime: i64,
    /// Tasks in source-line order.
    pub tasks: Vec<Task>,
}

/// Document path to indexed state.
pub type IndexSnapshot = BTreeMap<String, CacheEntry>;

/// Default index location for a vault.
#[must_use]
pub fn default_index_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(CONFIG_DIR).join(INDEX_FILE)
}

/// JSON file holding the whole index, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    /// Bind to a file path.
    ///
    /// # Errors
    /// Returns [`IndexFileError::EmptyPath`] for an empty path.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, IndexFileError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(IndexFileError::EmptyPath);
        }
        Ok(Self { path })
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the index. Returns `None` when no index has been saved yet.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub async fn load(&self) -> Result<Option<IndexSnapshot>, IndexFileError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };
        let mut snapshot: IndexSnapshot =
            serde_json::from_slice(&bytes).map_err(|source| IndexFileError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        // Keys are authoritative for the back-reference
        for (path, entry) in &mut snapshot {
            for task in &mut entry.tasks {
                task.file = Some(path.clone());
            }
        }
        Ok(Some(snapshot))
    }

    /// Write the index through a sibling temporary file and rename it into place.
    ///
    /// # Errors
    /// Returns an error when serialization or any filesystem step fails.
    pub async fn save(&self, snapshot: &IndexSnapshot) -> Result<(), IndexFileError> {
        let bytes = serde_json::to_vec(snapshot).map_err(|source| IndexFileError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }
        let staging = self.staging_path();
        fs::write(&staging, &bytes)
            .await
            .map_err(|source| self.io_error(source))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> IndexFileError {
        IndexFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use tasks_aio_core::TaskParser;
    use tempfile::tempdir;

    #[test]
    fn rejects_empty_path() {
        assert!(matches!(IndexFile::new(""), Err(IndexFileError::EmptyPath)));
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempdir().expect("tempdir");
        let file = IndexFile::new(default_index_path(dir.path())).expect("index file");
        assert!(file.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn save_writes_file_path_and_load_restores_back_references() {
        let dir = tempdir().expect("tempdir");
        let file = IndexFile::new(default_index_path(dir.path())).expect("index file");
        let tasks = TaskParser::new().parse_document("Daily.md", "- [ ] Buy milk 📅 2024-01-15\n");
        let snapshot = IndexSnapshot::from([("Daily.md".to_owned(), CacheEntry { mtime: 42, tasks })]);

        file.save(&snapshot).await.expect("save");
        assert!(!file.staging_path().exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(file.path()).expect("read")).expect("json");
        assert_eq!(raw["Daily.md"]["mtime"], 42);
        assert_eq!(raw["Daily.md"]["tasks"][0]["filePath"], "Daily.md");

        let loaded = file.load().await.expect("load").expect("present");
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").expect("write");
        let file = IndexFile::new(&path).expect("index file");
        assert!(matches!(file.load().await, Err(IndexFileError::Malformed { .. })));
    }
}
