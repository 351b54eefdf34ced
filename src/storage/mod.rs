//! Storage module for persisting run progress
//!
//! This module handles checkpoint persistence, including:
//! - The `CheckpointStore` trait and its JSON file and SQLite backends
//! - The typed, serializable checkpoint state
//! - Atomic file replacement shared with the output artifact

mod checkpoint;
mod json_file;
mod schema;
mod sqlite;
mod traits;

pub use checkpoint::{load_state, save_state, CheckpointState, GroupRecord};
pub use json_file::{write_atomic, JsonFileStore};
pub use sqlite::SqliteStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::config::{CheckpointBackend, JobConfig};
use std::path::Path;

/// Opens the checkpoint backend selected by the job configuration
pub fn open_store(job: &JobConfig) -> StorageResult<Box<dyn CheckpointStore + Send>> {
    let path = Path::new(&job.checkpoint_path);

    let store: Box<dyn CheckpointStore + Send> = match job.checkpoint_backend {
        CheckpointBackend::Json => Box::new(JsonFileStore::new(path)),
        CheckpointBackend::Sqlite => Box::new(SqliteStore::new(path)?),
    };

    tracing::debug!("Checkpoint store: {}", store.describe());
    Ok(store)
}
