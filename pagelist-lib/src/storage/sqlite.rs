//! SQLite-backed durable storage backend.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;

use super::StorageBackend;
use crate::error::StorageError;

/// A durable backend backed by SQLite.
///
/// Data is stored in a single key/value table and survives process restarts.
/// When opened with a page limit, SQLite's "database or disk is full" error is
/// reported as [`StorageError::QuotaExceeded`], so the
/// [`PersistentStore`](super::PersistentStore) can clear and retry.
///
/// # Example
///
/// ```ignore
/// use pagelist_lib::storage::SqliteBackend;
///
/// // File-based storage
/// let backend = SqliteBackend::open("pagelist.db")?;
///
/// // In-memory storage (for testing)
/// let backend = SqliteBackend::open_in_memory()?;
/// ```
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens SQLite storage at the specified path.
    ///
    /// Creates the database file and table if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory SQLite database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Caps the database at `pages` pages.
    pub fn with_max_pages(self, pages: u32) -> Result<Self, StorageError> {
        {
            let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
            // max_page_count echoes the new limit as a row.
            conn.query_row(&format!("PRAGMA max_page_count = {}", pages), [], |_| Ok(()))?;
        }
        Ok(self)
    }

    fn init_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|len| len == 0)
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            rusqlite::params![key, value],
        )
        .map_err(|e| map_write_error(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

fn map_write_error(key: &str, error: rusqlite::Error) -> StorageError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => StorageError::quota(key),
        _ => StorageError::Sqlite(error),
    }
}
