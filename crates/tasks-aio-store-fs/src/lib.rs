//! Filesystem-backed document vault for the task index.

mod error;
mod frontmatter;

use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tasks_aio_core::{Document, DocumentEvent, Frontmatter};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub use error::{Result, VaultError};
pub use frontmatter::split_frontmatter;

const READ_CACHE_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
struct CachedContent {
    mtime: i64,
    len: u64,
    content: String,
}

/// Markdown vault rooted at a directory.
///
/// Paths handed in and out are vault-relative with `/` separators. Entries whose
/// name starts with `.` are invisible, which keeps `.git`, `.obsidian` and the
/// index directory out of enumeration. Mutations made through the vault publish
/// [`DocumentEvent`]s to every subscriber.
#[derive(Clone)]
pub struct FsVault {
    root: PathBuf,
    read_cache: Arc<Mutex<LruCache<String, CachedContent>>>,
    events: broadcast::Sender<DocumentEvent>,
}

impl FsVault {
    /// Open an existing directory as a vault.
    ///
    /// # Errors
    /// Returns [`VaultError::NotADirectory`] when `root` is not a directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(VaultError::NotADirectory(root.to_path_buf()));
        }
        let capacity = NonZeroUsize::new(READ_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            root: root.to_path_buf(),
            read_cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            events,
        })
    }

    /// Root directory of the vault.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive change notifications for mutations made through this vault.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    /// Enumerate every visible file below the root, sorted by path.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be read.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|err| VaultError::io(&self.display(&dir), err))?;
            for entry in entries {
                let entry = entry.map_err(|err| VaultError::io(&self.display(&dir), err))?;
                if entry.file_name().to_str().is_none_or(|name| name.starts_with('.')) {
                    continue;
                }
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .map_err(|err| VaultError::io(&self.display(&path), err))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file()
                    && let Some(relative) = self.relative(&path)
                {
                    let meta = entry.metadata().map_err(|err| VaultError::io(&relative, err))?;
                    out.push(Document::new(relative, mtime_millis(&meta)));
                }
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(documents = out.len(), root = %self.root.display(), "Listed vault documents");
        Ok(out)
    }

    /// Resolve a path to a live document handle.
    ///
    /// # Errors
    /// Returns an error for invalid paths or unreadable metadata.
    pub fn document(&self, path: &str) -> Result<Option<Document>> {
        let full = self.resolve(path)?;
        match fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(Some(Document::new(path, mtime_millis(&meta)))),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(VaultError::io(path, err)),
        }
    }

    /// Read the full content of a document.
    ///
    /// # Errors
    /// Returns [`VaultError::NotFound`] when the document is missing.
    pub fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|err| VaultError::io(path, err))
    }

    /// Read through the LRU cache; entries are reused while mtime and size match.
    ///
    /// # Errors
    /// Returns [`VaultError::NotFound`] when the document is missing.
    pub fn cached_read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).map_err(|err| VaultError::io(path, err))?;
        let mtime = mtime_millis(&meta);
        let len = meta.len();

        let hit = self.read_cache.lock().ok().and_then(|mut cache| {
            cache
                .get(path)
                .filter(|cached| cached.mtime == mtime && cached.len == len)
                .map(|cached| cached.content.clone())
        });
        if let Some(content) = hit {
            return Ok(content);
        }

        let content = fs::read_to_string(&full).map_err(|err| VaultError::io(path, err))?;
        self.remember(path, mtime, len, &content);
        Ok(content)
    }

    /// Parse the YAML front matter of a document. Malformed front matter reads as absent.
    ///
    /// # Errors
    /// Returns an error when the document cannot be read.
    pub fn frontmatter(&self, path: &str) -> Result<Option<Frontmatter>> {
        let content = self.cached_read(path)?;
        let Some((yaml, _)) = split_frontmatter(&content) else {
            return Ok(None);
        };
        match serde_yaml::from_str::<serde_json::Value>(yaml) {
            Ok(value) => Ok(Some(Frontmatter::from_value(value))),
            Err(err) => {
                debug!(%path, error = %err, "Ignoring malformed front matter");
                Ok(None)
            }
        }
    }

    /// Replace the content of a document, creating it (and parent folders) if needed.
    ///
    /// # Errors
    /// Returns an error if the path is invalid or the write fails.
    pub fn write(&self, path: &str, content: &str) -> Result<Document> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|err| VaultError::io(path, err))?;
        }
        fs::write(&full, content).map_err(|err| VaultError::io(path, err))?;
        let meta = fs::metadata(&full).map_err(|err| VaultError::io(path, err))?;
        let document = Document::new(path, mtime_millis(&meta));
        self.remember(path, document.mtime, meta.len(), content);

        info!(%path, bytes = content.len(), "Wrote document");
        self.publish(DocumentEvent::Changed {
            document: document.clone(),
            content: Some(content.to_owned()),
        });
        Ok(document)
    }

    /// Create a new document.
    ///
    /// # Errors
    /// Returns [`VaultError::AlreadyExists`] when the path is taken.
    pub fn create(&self, path: &str, content: &str) -> Result<Document> {
        if self.resolve(path)?.exists() {
            return Err(VaultError::AlreadyExists(path.to_owned()));
        }
        self.write(path, content)
    }

    /// Move a document.
    ///
    /// # Errors
    /// Returns [`VaultError::NotFound`] or [`VaultError::AlreadyExists`] as appropriate.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<Document> {
        let from = self.resolve(old_path)?;
        let to = self.resolve(new_path)?;
        if !from.is_file() {
            return Err(VaultError::NotFound(old_path.to_owned()));
        }
        if to.exists() {
            return Err(VaultError::AlreadyExists(new_path.to_owned()));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|err| VaultError::io(new_path, err))?;
        }
        fs::rename(&from, &to).map_err(|err| VaultError::io(old_path, err))?;
        self.forget(old_path);
        let meta = fs::metadata(&to).map_err(|err| VaultError::io(new_path, err))?;
        let document = Document::new(new_path, mtime_millis(&meta));

        info!(from = %old_path, to = %new_path, "Renamed document");
        self.publish(DocumentEvent::Renamed {
            document: document.clone(),
            old_path: old_path.to_owned(),
        });
        Ok(document)
    }

    /// Remove a document.
    ///
    /// # Errors
    /// Returns [`VaultError::NotFound`] when the document is missing.
    pub fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|err| VaultError::io(path, err))?;
        self.forget(path);

        info!(%path, "Deleted document");
        self.publish(DocumentEvent::Deleted { path: path.to_owned() });
        Ok(())
    }

    /// Announce a change made outside the vault (for example by an external editor).
    ///
    /// # Errors
    /// Returns [`VaultError::NotFound`] when the document is missing.
    pub fn announce_change(&self, path: &str) -> Result<Document> {
        let document = self
            .document(path)?
            .ok_or_else(|| VaultError::NotFound(path.to_owned()))?;
        self.publish(DocumentEvent::Changed {
            document: document.clone(),
            content: None,
        });
        Ok(document)
    }

    fn publish(&self, event: DocumentEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for vault event");
        }
    }

    fn remember(&self, path: &str, mtime: i64, len: u64, content: &str) {
        if let Ok(mut cache) = self.read_cache.lock() {
            cache.put(
                path.to_owned(),
                CachedContent {
                    mtime,
                    len,
                    content: content.to_owned(),
                },
            );
        }
    }

    fn forget(&self, path: &str) {
        if let Ok(mut cache) = self.read_cache.lock() {
            cache.pop(path);
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(VaultError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }

    fn relative(&self, full: &Path) -> Option<String> {
        let relative = full.strip_prefix(&self.root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                return None;
            };
            segments.push(segment.to_str()?);
        }
        Some(segments.join("/"))
    }

    fn display(&self, full: &Path) -> String {
        self.relative(full).unwrap_or_else(|| full.display().to_string())
    }
}

fn mtime_millis(meta: &fs::Metadata) -> i64 {
    meta.modified().map_or(0, |modified| {
        let nanos = OffsetDateTime::from(modified).unix_timestamp_nanos();
        i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
    })
}
