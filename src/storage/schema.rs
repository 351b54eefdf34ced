//! Database schema definitions
//!
//! This module contains the SQL schema of the checkpoint database.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Single-row checkpoint; id is always 1
CREATE TABLE IF NOT EXISTS checkpoint (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Most recent saves, pruned to the store's history limit
CREATE TABLE IF NOT EXISTS checkpoint_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_at TEXT NOT NULL,
    state_bytes INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// Creates all tables if they don't exist.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
