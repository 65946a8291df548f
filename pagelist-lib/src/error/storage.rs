//! Storage error types

/// Errors raised by a [`StorageBackend`](crate::storage::StorageBackend).
///
/// These never reach callers of [`PersistentStore`](crate::storage::PersistentStore),
/// which absorbs them; they are visible only to code that talks to a backend
/// directly.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The write would exceed the backend's capacity.
    #[error("Storage quota exceeded writing '{key}'")]
    QuotaExceeded {
        /// Key whose write was rejected.
        key: String,
    },

    /// SQLite reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Compressing or decompressing a value failed.
    #[error("Codec error: {0}")]
    Codec(#[from] std::io::Error),

    /// The backend's lock was poisoned by a panicking writer.
    #[error("Storage backend lock poisoned")]
    Poisoned,
}

impl StorageError {
    /// Creates a quota error for the given key.
    pub fn quota(key: impl Into<String>) -> Self {
        Self::QuotaExceeded { key: key.into() }
    }

    /// Returns `true` if this is a quota error.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
