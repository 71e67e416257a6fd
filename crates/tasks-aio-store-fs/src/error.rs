//! Error types for vault operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during `FsVault` operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The vault root does not exist or is not a directory.
    #[error("Vault root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Path escapes the vault or is otherwise unusable.
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// Document was not found in the vault.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Target of a create or rename already exists.
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Vault-relative path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Blocking worker running the operation panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Background(String),
}

impl VaultError {
    pub(crate) fn io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(path.to_owned());
        }
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// Result alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
