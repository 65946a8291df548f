//! In-memory storage backend using DashMap

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

use super::StorageBackend;
use crate::error::StorageError;

/// An in-memory backend backed by a concurrent hash map.
///
/// An optional byte quota makes it behave like a browser's local storage:
/// writes that would push the total size of keys and values past the quota
/// are rejected with [`StorageError::QuotaExceeded`].
///
/// # Example
///
/// ```
/// use pagelist_lib::storage::{MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::with_quota(16);
/// assert!(backend.set("k", b"small".to_vec()).is_ok());
/// assert!(backend.set("k2", vec![0; 64]).unwrap_err().is_quota());
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: DashMap<String, Vec<u8>>,
    used: AtomicUsize,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Creates a new unbounded backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that holds at most `bytes` of keys and values.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the bytes currently accounted against the quota.
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let new_size = key.len() + value.len();
        let old_size = self
            .store
            .get(key)
            .map(|entry| key.len() + entry.value().len())
            .unwrap_or(0);

        if let Some(quota) = self.quota {
            let projected = self.used_bytes().saturating_sub(old_size) + new_size;
            if projected > quota {
                return Err(StorageError::quota(key));
            }
        }

        self.store.insert(key.to_string(), value);
        self.used.fetch_add(new_size, Ordering::SeqCst);
        self.used.fetch_sub(old_size, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if let Some((key, value)) = self.store.remove(key) {
            self.used.fetch_sub(key.len() + value.len(), Ordering::SeqCst);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.store.clear();
        self.used.store(0, Ordering::SeqCst);
        Ok(())
    }
}
