//! Async document storage abstraction consumed by the task cache.

use anyhow::Error;
use std::future::Future;
use tasks_aio_core::{Document, DocumentEvent, Frontmatter};
use tasks_aio_store_fs::{FsVault, VaultError};
use tokio::sync::broadcast;

/// Document storage the cache indexes and the task service writes through.
///
/// Futures are `Send` so cache work can run on spawned tasks.
pub trait DocumentStore: Send + Sync + 'static {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error> + Send;

    /// Enumerate every document in the store.
    ///
    /// # Errors
    /// Returns a store-specific error when listing fails.
    fn list_documents(&self) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send;

    /// Resolve a path to a live document, or `None` when it does not exist.
    ///
    /// # Errors
    /// Returns a store-specific error when the lookup fails.
    fn document(&self, path: &str) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send;

    /// Read the full content of a document. Cached reads are acceptable.
    ///
    /// # Errors
    /// Returns a store-specific error when the document cannot be read.
    fn read(&self, path: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Front-matter properties of a document.
    ///
    /// # Errors
    /// Returns a store-specific error when the document cannot be read.
    fn frontmatter(&self, path: &str) -> impl Future<Output = Result<Option<Frontmatter>, Self::Error>> + Send;

    /// Replace the content of a document.
    ///
    /// # Errors
    /// Returns a store-specific error when the write fails.
    fn write(&self, path: &str, content: &str) -> impl Future<Output = Result<Document, Self::Error>> + Send;

    /// Receive change notifications.
    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent>;
}

async fn blocking<T, F>(op: F) -> Result<T, VaultError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, VaultError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| VaultError::Background(format!("Task join error: {e}")))?
}

impl DocumentStore for FsVault {
    type Error = VaultError;

    async fn list_documents(&self) -> Result<Vec<Document>, Self::Error> {
        // Clone the vault handle so blocking I/O runs off the async worker
        let vault = self.clone();
        blocking(move || vault.list_documents()).await
    }

    async fn document(&self, path: &str) -> Result<Option<Document>, Self::Error> {
        let (vault, path) = (self.clone(), path.to_owned());
        blocking(move || vault.document(&path)).await
    }

    async fn read(&self, path: &str) -> Result<String, Self::Error> {
        let (vault, path) = (self.clone(), path.to_owned());
        blocking(move || vault.cached_read(&path)).await
    }

    async fn frontmatter(&self, path: &str) -> Result<Option<Frontmatter>, Self::Error> {
        let (vault, path) = (self.clone(), path.to_owned());
        blocking(move || vault.frontmatter(&path)).await
    }

    async fn write(&self, path: &str, content: &str) -> Result<Document, Self::Error> {
        let (vault, path, content) = (self.clone(), path.to_owned(), content.to_owned());
        blocking(move || vault.write(&path, &content)).await
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        Self::subscribe(self)
    }
}
