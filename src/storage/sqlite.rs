//! SQLite checkpoint backend
//!
//! The state lives in a single row that every save replaces inside a
//! transaction.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Saves kept in `checkpoint_history` unless overridden
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    history_limit: u32,
}

impl SqliteStore {
    /// Opens or creates the checkpoint database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Keeps only the most recent `limit` history rows
    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    /// Number of saves retained in the history table
    pub fn save_count(&self) -> StorageResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM checkpoint_history", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CheckpointStore for SqliteStore {
    fn load(&self) -> StorageResult<Option<String>> {
        let state = self
            .conn
            .query_row("SELECT state FROM checkpoint WHERE id = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(state)
    }

    fn save(&mut self, state: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO checkpoint (id, state, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![state, now],
        )?;
        tx.execute(
            "INSERT INTO checkpoint_history (saved_at, state_bytes) VALUES (?1, ?2)",
            params![now, state.len() as i64],
        )?;
        tx.execute(
            "DELETE FROM checkpoint_history
             WHERE id <= (SELECT MAX(id) FROM checkpoint_history) - ?1",
            params![self.history_limit],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM checkpoint", [])?;
        tx.execute("DELETE FROM checkpoint_history", [])?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }
}
