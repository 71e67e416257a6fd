//! Application layer for the markdown task index.
//!
//! This crate wires the parser to a document store: configuration, exclusion
//! rules, the persisted index, the incremental [`TaskCache`] and the
//! [`TaskService`] write-back helpers.

pub mod document_store;
pub mod exclusion;
pub mod index_file;
pub mod settings;
pub mod task_cache;
pub mod task_service;

// Re-exports for convenience
pub use document_store::DocumentStore;
pub use exclusion::{Exclusion, ExclusionRules};
pub use index_file::{CacheEntry, IndexFile, IndexFileError, IndexSnapshot, default_index_path};
pub use settings::{CONFIG_DIR, DateFormat, Settings, SettingsError, StatusDefinition, TimeFormat};
pub use task_cache::{CacheEvent, TaskCache};
pub use task_service::TaskService;
