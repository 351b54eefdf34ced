//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the serialized checkpoint
///
/// Every `save` overwrites the whole previous state. A crash at any point
/// leaves either the old or the new state readable, never a mix.
pub trait CheckpointStore: Send {
    /// Returns the last saved state, or `None` if nothing was saved yet
    fn load(&self) -> StorageResult<Option<String>>;

    /// Replaces the stored state
    fn save(&mut self, state: &str) -> StorageResult<()>;

    /// Removes the stored state
    fn clear(&mut self) -> StorageResult<()>;

    /// Human-readable location for log messages
    fn describe(&self) -> String;
}
