//! Durable key/value persistence
//!
//! Provides a `StorageBackend` trait for raw byte storage and the
//! [`PersistentStore`] adapter layered over it. The adapter is what the rest of
//! the crate talks to: it encodes values, recovers from quota exhaustion and
//! never surfaces an error to its caller.
//!
//! Keys used by the crate:
//!
//! - `"<list id>:scroll"`: last scroll offset of a list
//! - `"<normalized query>"`: total count for a query
//! - `"<normalized query>:<index>"`: one record as JSON

mod config;
mod memory;
mod sqlite;

pub use config::*;
pub use memory::*;
pub use sqlite::*;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Trait for storage backends.
///
/// Implementations store raw bytes by string key. They report capacity
/// problems as [`StorageError::QuotaExceeded`] so the adapter can recover.
pub trait StorageBackend: Send + Sync {
    /// Returns the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Removes `key`.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Builds the key holding a list's scroll offset.
pub fn scroll_key(list_id: &str) -> String {
    format!("{}:scroll", list_id)
}

/// Builds the key holding one record of a query's result set.
pub fn record_key(normalized_query: &str, index: usize) -> String {
    format!("{}:{}", normalized_query, index)
}

/// Fault-tolerant string store over a [`StorageBackend`].
///
/// Cheap to clone; clones share the backend.
///
/// # Example
///
/// ```
/// use pagelist_lib::storage::{MemoryBackend, PersistentStore, StorageConfig};
///
/// let store = PersistentStore::new(MemoryBackend::new(), StorageConfig::compressed());
/// store.put_json("list:scroll", &480.0);
/// assert_eq!(store.get_json::<f64>("list:scroll"), Some(480.0));
/// ```
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn StorageBackend>,
    config: StorageConfig,
}

impl PersistentStore {
    /// Creates a store over `backend`.
    pub fn new(backend: impl StorageBackend + 'static, config: StorageConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    /// Creates a store over an already shared backend.
    pub fn from_shared(backend: Arc<dyn StorageBackend>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    /// Creates an unbounded, uncompressed in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new(), StorageConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Stores `value` under `key`.
    ///
    /// On a quota error the whole store is cleared once and the write retried.
    /// Any remaining failure is logged and the write dropped.
    pub fn put(&self, key: &str, value: &str) {
        let bytes = match self.encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Dropping write for '{}': {}", key, e);
                return;
            }
        };

        match self.backend.set(key, bytes.clone()) {
            Ok(()) => {}
            Err(e) if e.is_quota() => {
                log::warn!("Storage quota exceeded writing '{}', clearing store", key);
                if let Err(e) = self.backend.clear() {
                    log::error!("Failed to clear storage: {}", e);
                }
                if let Err(e) = self.backend.set(key, bytes) {
                    log::error!("Dropping write for '{}' after clearing storage: {}", key, e);
                }
            }
            Err(e) => log::error!("Dropping write for '{}': {}", key, e),
        }
    }

    /// Returns the value stored under `key`.
    ///
    /// Values that cannot be read or decoded are treated as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let bytes = match self.backend.get(key) {
            Ok(bytes) => bytes?,
            Err(e) => {
                log::warn!("Failed to read '{}': {}", key, e);
                return None;
            }
        };

        match self.decode(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Bad data for key '{}': {}", key, e);
                None
            }
        }
    }

    /// Serializes `value` as JSON and stores it.
    pub fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.put(key, &json),
            Err(e) => log::error!("Dropping write for '{}': {}", key, e),
        }
    }

    /// Reads and deserializes a JSON value; malformed data reads as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Bad data for key '{}': {}", key, e);
                None
            }
        }
    }

    /// Removes `key`, logging failures.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            log::warn!("Failed to remove '{}': {}", key, e);
        }
    }

    fn encode(&self, value: &str) -> Result<Vec<u8>, StorageError> {
        match self.config.compression {
            Compression::None => Ok(value.as_bytes().to_vec()),
            Compression::Zstd(level) => Ok(zstd::encode_all(value.as_bytes(), level)?),
        }
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<String, StorageError> {
        let raw = match self.config.compression {
            Compression::None => bytes,
            Compression::Zstd(_) => zstd::decode_all(bytes.as_slice())?,
        };
        String::from_utf8(raw)
            .map_err(|e| StorageError::Codec(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_quota_clears_and_retries() {
        let backend = Arc::new(MemoryBackend::with_quota(32));
        let store = PersistentStore::from_shared(backend.clone(), StorageConfig::default());

        store.put("old", "0123456789");
        store.put("new", "01234567890123456789");

        // The first write was sacrificed to make room for the second.
        assert_eq!(store.get("old"), None);
        assert_eq!(store.get("new").as_deref(), Some("01234567890123456789"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_oversized_write_is_dropped() {
        let store = PersistentStore::new(MemoryBackend::with_quota(8), StorageConfig::default());
        store.put("a", "1");
        store.put("big", "this value can never fit");
        assert_eq!(store.get("big"), None);
    }

    #[test]
    fn test_compressed_round_trip() {
        let store = PersistentStore::new(MemoryBackend::new(), StorageConfig::compressed());
        let record = json!({"title": "Alpha", "year": 1987, "tags": ["x", "y"]});
        store.put_json("q:0", &record);
        assert_eq!(store.get_json::<serde_json::Value>("q:0"), Some(record));
    }

    #[test]
    fn test_undecodable_value_reads_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("k", b"not zstd".to_vec()).unwrap();
        let store = PersistentStore::from_shared(backend, StorageConfig::compressed());
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_malformed_json_reads_as_absent() {
        let store = PersistentStore::in_memory();
        store.put("k", "{not json");
        assert_eq!(store.get_json::<serde_json::Value>("k"), None);
    }

    #[test]
    fn test_keys() {
        assert_eq!(scroll_key("results"), "results:scroll");
        assert_eq!(record_key(r#"{"a":1}"#, 7), r#"{"a":1}:7"#);
    }
}
