//! Incremental task index kept in sync with a [`DocumentStore`].

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tasks_aio_core::{Document, DocumentEvent, Task, TaskFilter, TaskParser};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::document_store::DocumentStore;
use crate::exclusion::ExclusionRules;
use crate::index_file::{CacheEntry, IndexFile, IndexSnapshot};
use crate::settings::Settings;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notification published to cache consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Indexed tasks changed, for one document or (with `None`) in bulk.
    Updated(Option<String>),
    /// First initialization finished.
    Initialized,
}

/// Settings-derived configuration used by a single re-index.
#[derive(Debug)]
struct IndexConfig {
    parser: TaskParser,
    rules: ExclusionRules,
}

impl IndexConfig {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            parser: TaskParser::with_completed_symbols(settings.completed_symbols()),
            rules: ExclusionRules::from_settings(settings),
        }
    }
}

struct CacheState {
    entries: BTreeMap<String, CacheEntry>,
    flattened: Option<Arc<[Task]>>,
    initialized: bool,
    settings: Settings,
    config: Arc<IndexConfig>,
}

impl CacheState {
    fn replace(&mut self, path: &str, entry: CacheEntry) {
        self.entries.insert(path.to_owned(), entry);
        self.flattened = None;
    }

    fn remove(&mut self, path: &str) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            self.flattened = None;
        }
        removed
    }
}

/// Process-wide task index.
///
/// Holds the tasks of every indexed document keyed by path, persists them to an
/// [`IndexFile`] after each mutation and re-indexes documents as the store reports
/// changes. Every re-index replaces a document's entry wholesale, so overlapping
/// re-indexes of the same document settle on whichever finishes last.
pub struct TaskCache<S> {
    store: Arc<S>,
    index: IndexFile,
    state: RwLock<CacheState>,
    events: broadcast::Sender<CacheEvent>,
    init_gate: tokio::sync::Mutex<()>,
    save_gate: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Result of re-indexing one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Not a markdown document.
    Skipped,
    /// Filtered out; `removed` tells whether a previous entry was dropped.
    Excluded { removed: bool },
    /// Tasks replaced.
    Indexed,
    /// Read failed; the previous entry is untouched.
    Failed,
}

impl Outcome {
    const fn changed(self) -> bool {
        matches!(self, Self::Indexed | Self::Excluded { removed: true })
    }
}

impl<S: DocumentStore> TaskCache<S> {
    /// Create an uninitialized cache.
    ///
    /// # Errors
    /// Returns an error when `index_path` is empty or `settings` are invalid.
    pub fn new(store: Arc<S>, index_path: impl Into<PathBuf>, settings: Settings) -> Result<Self> {
        let index = IndexFile::new(index_path).context("Invalid index location")?;
        settings.validate().context("Invalid settings")?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            store,
            index,
            state: RwLock::new(CacheState {
                entries: BTreeMap::new(),
                flattened: None,
                initialized: false,
                config: Arc::new(IndexConfig::from_settings(&settings)),
                settings,
            }),
            events,
            init_gate: tokio::sync::Mutex::new(()),
            save_gate: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        })
    }

    /// Load the persisted index, re-index stale documents and start following store changes.
    ///
    /// Subsequent calls are no-ops. A missing or corrupt index file is logged and
    /// treated as empty.
    ///
    /// # Errors
    /// Returns an error when the store cannot enumerate its documents; the cache
    /// stays uninitialized and the call may be retried.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        let _gate = self.init_gate.lock().await;
        if self.is_initialized() {
            return Ok(());
        }
        info!(index = %self.index.path().display(), "Initializing task cache");

        // Subscribe before scanning so no change between the scan and the listener is lost
        let changes = self.store.subscribe();
        let persisted = self.load_persisted().await;
        let documents = self
            .store
            .list_documents()
            .await
            .map_err(Into::into)
            .context("Failed to list documents")?;
        let markdown: Vec<Document> = documents.into_iter().filter(Document::is_markdown).collect();

        let restored = persisted.len();
        let (entries, recomputed) = self.reconcile(persisted, &markdown).await;
        let mut dirty = recomputed || restored != entries.len();
        {
            let mut state = self.write_state();
            state.entries = entries;
            state.flattened = None;
        }

        let mut reindexed = 0_usize;
        for document in &markdown {
            let cached_mtime = self.read_state().entries.get(&document.path).map(|entry| entry.mtime);
            if cached_mtime != Some(document.mtime) {
                let outcome = self.index_document(document, None).await;
                dirty |= outcome.changed();
                reindexed += 1;
            }
        }

        if dirty {
            self.save().await;
        }

        let handle = tokio::spawn(listen(Arc::downgrade(self), changes));
        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }

        let (documents, tasks) = {
            let mut state = self.write_state();
            state.initialized = true;
            (state.entries.len(), state.entries.values().map(|entry| entry.tasks.len()).sum::<usize>())
        };
        self.notify(CacheEvent::Initialized);
        info!(documents, tasks, reindexed, "Task cache initialized");
        Ok(())
    }

    /// Replace the active settings. When initialized, every document is re-indexed.
    ///
    /// # Errors
    /// Returns an error when the settings are invalid or the store cannot be listed.
    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.validate().context("Invalid settings")?;
        let initialized = {
            let mut state = self.write_state();
            state.config = Arc::new(IndexConfig::from_settings(&settings));
            state.settings = settings;
            state.initialized
        };
        if initialized {
            self.reindex_all().await?;
        }
        Ok(())
    }

    /// Snapshot of the active settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.read_state().settings.clone()
    }

    /// Tasks of one document in line order; empty when the document is not indexed.
    #[must_use]
    pub fn get_tasks(&self, path: &str) -> Vec<Task> {
        self.read_state()
            .entries
            .get(path)
            .map(|entry| entry.tasks.clone())
            .unwrap_or_default()
    }

    /// Every indexed task, documents in path order and tasks in line order.
    ///
    /// The flattening is memoized: calls without an intervening mutation return the
    /// same allocation.
    #[must_use]
    pub fn get_all_tasks(&self) -> Arc<[Task]> {
        if let Some(flattened) = &self.read_state().flattened {
            return Arc::clone(flattened);
        }
        let mut state = self.write_state();
        if let Some(flattened) = &state.flattened {
            return Arc::clone(flattened);
        }
        let flattened: Arc<[Task]> = state
            .entries
            .values()
            .flat_map(|entry| entry.tasks.iter().cloned())
            .collect();
        state.flattened = Some(Arc::clone(&flattened));
        drop(state);
        flattened
    }

    /// Tasks matching `filter`, in the order of [`Self::get_all_tasks`].
    #[must_use]
    pub fn filtered_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.get_all_tasks()
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect()
    }

    /// Receive cache notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Whether [`Self::initialize`] has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.read_state().initialized
    }

    /// Re-index one document without notifying. Returns whether the index changed.
    pub async fn reindex_quietly(&self, document: &Document, content: Option<String>) -> bool {
        self.index_document(document, content).await.changed()
    }

    /// Re-index one document and notify consumers when the index changed.
    pub async fn reindex_and_notify(&self, document: &Document, content: Option<String>) -> bool {
        let changed = self.reindex_quietly(document, content).await;
        if changed {
            self.notify(CacheEvent::Updated(Some(document.path.clone())));
        }
        changed
    }

    /// Re-index every document quietly, drop entries of vanished documents, then
    /// publish one bulk update and persist.
    ///
    /// # Errors
    /// Returns an error when the store cannot enumerate its documents.
    pub async fn reindex_all(&self) -> Result<()> {
        let documents = self
            .store
            .list_documents()
            .await
            .map_err(Into::into)
            .context("Failed to list documents")?;
        let markdown: Vec<Document> = documents.into_iter().filter(Document::is_markdown).collect();
        for document in &markdown {
            self.reindex_quietly(document, None).await;
        }

        let live: HashSet<&str> = markdown.iter().map(|doc| doc.path.as_str()).collect();
        {
            let mut state = self.write_state();
            let before = state.entries.len();
            state.entries.retain(|path, _| live.contains(path.as_str()));
            if state.entries.len() != before {
                state.flattened = None;
            }
        }

        debug!(documents = markdown.len(), "Re-indexed all documents");
        self.notify(CacheEvent::Updated(None));
        self.save().await;
        Ok(())
    }

    /// Apply one change notification from the store, then persist.
    pub async fn handle_document_event(&self, event: DocumentEvent) {
        match event {
            DocumentEvent::Changed { document, content } => {
                self.reindex_and_notify(&document, content).await;
            }
            DocumentEvent::Deleted { path } => {
                if self.write_state().remove(&path) {
                    debug!(%path, "Dropped tasks of deleted document");
                    self.notify(CacheEvent::Updated(None));
                }
            }
            DocumentEvent::Renamed { document, old_path } => {
                let removed = self.write_state().remove(&old_path);
                // Task ids embed the path, so the destination is indexed from scratch
                let indexed = document.is_markdown() && self.reindex_and_notify(&document, None).await;
                if removed && !indexed {
                    self.notify(CacheEvent::Updated(None));
                }
                debug!(from = %old_path, to = %document.path, "Handled rename");
            }
        }
        self.save().await;
    }

    /// Stop following store changes.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            debug!("Task cache listener stopped");
        }
    }

    async fn index_document(&self, document: &Document, content: Option<String>) -> Outcome {
        if !document.is_markdown() {
            return Outcome::Skipped;
        }
        let path = document.path.as_str();
        let config = Arc::clone(&self.read_state().config);

        let mut exclusion = config.rules.check_path(document);
        if exclusion.is_none() && config.rules.inspects_frontmatter() {
            match self.store.frontmatter(path).await {
                Ok(frontmatter) => exclusion = config.rules.check_frontmatter(frontmatter.as_ref()),
                Err(err) => {
                    let err: anyhow::Error = err.into();
                    warn!(%path, error = %err, "Failed to read front matter");
                    return Outcome::Failed;
                }
            }
        }
        if let Some(reason) = exclusion {
            let removed = self.write_state().remove(path);
            debug!(%path, ?reason, removed, "Document excluded from index");
            return Outcome::Excluded { removed };
        }

        let content = match content {
            Some(content) => content,
            None => match self.store.read(path).await {
                Ok(content) => content,
                Err(err) => {
                    let err: anyhow::Error = err.into();
                    warn!(%path, error = %err, "Failed to read document");
                    return Outcome::Failed;
                }
            },
        };

        let tasks = config.parser.parse_document(path, &content);
        debug!(%path, tasks = tasks.len(), "Indexed document");
        self.write_state().replace(
            path,
            CacheEntry {
                mtime: document.mtime,
                tasks,
            },
        );
        Outcome::Indexed
    }

    /// Bring persisted entries in line with the live documents and the current settings.
    ///
    /// Entries of vanished or now-excluded documents are dropped, and `completed` is
    /// recomputed from the stored status. Returns the kept entries and whether any
    /// task changed its completion.
    async fn reconcile(&self, persisted: IndexSnapshot, live: &[Document]) -> (IndexSnapshot, bool) {
        let config = Arc::clone(&self.read_state().config);
        let live: HashMap<&str, &Document> = live.iter().map(|doc| (doc.path.as_str(), doc)).collect();

        let mut kept = IndexSnapshot::new();
        let mut recomputed = false;
        for (path, mut entry) in persisted {
            let Some(document) = live.get(path.as_str()) else {
                debug!(%path, "Dropping persisted entry of missing document");
                continue;
            };
            if let Some(reason) = config.rules.check_path(document) {
                debug!(%path, ?reason, "Dropping persisted entry of excluded document");
                continue;
            }
            if config.rules.inspects_frontmatter() {
                match self.store.frontmatter(&path).await {
                    Ok(frontmatter) => {
                        if let Some(reason) = config.rules.check_frontmatter(frontmatter.as_ref()) {
                            debug!(%path, ?reason, "Dropping persisted entry of excluded document");
                            continue;
                        }
                    }
                    Err(err) => {
                        let err: anyhow::Error = err.into();
                        warn!(%path, error = %err, "Failed to read front matter");
                    }
                }
            }
            for task in &mut entry.tasks {
                let completed = task.is_task && config.parser.is_completed_status(&task.status);
                if task.completed != completed {
                    task.completed = completed;
                    recomputed = true;
                }
            }
            kept.insert(path, entry);
        }
        (kept, recomputed)
    }

    async fn load_persisted(&self) -> IndexSnapshot {
        match self.index.load().await {
            Ok(Some(snapshot)) => {
                info!(documents = snapshot.len(), "Loaded persisted task index");
                snapshot
            }
            Ok(None) => {
                debug!("No persisted task index found");
                IndexSnapshot::new()
            }
            Err(err) => {
                warn!(error = %err, "Failed to load persisted task index; rebuilding");
                IndexSnapshot::new()
            }
        }
    }

    async fn save(&self) {
        let _gate = self.save_gate.lock().await;
        let snapshot = self.read_state().entries.clone();
        if let Err(err) = self.index.save(&snapshot).await {
            error!(error = %err, "Failed to save task index");
        }
    }

    fn notify(&self, event: CacheEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for cache event");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn listen<S: DocumentStore>(cache: Weak<TaskCache<S>>, mut changes: broadcast::Receiver<DocumentEvent>) {
    loop {
        let received = changes.recv().await;
        let Some(cache) = cache.upgrade() else {
            break;
        };
        match received {
            Ok(event) => cache.handle_document_event(event).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed document changes; re-indexing everything");
                if let Err(err) = cache.reindex_all().await {
                    error!(error = %err, "Full re-index failed");
                }
            }
            Err(RecvError::Closed) => {
                debug!("Document store closed its change stream");
                break;
            }
        }
    }
}
