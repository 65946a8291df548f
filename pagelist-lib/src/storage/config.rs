//! Storage configuration

/// How values are transformed before they reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Values are stored as their UTF-8 bytes.
    #[default]
    None,
    /// Values are zstd-compressed at the given level.
    Zstd(i32),
}

/// Configuration for the [`PersistentStore`](super::PersistentStore).
///
/// # Example
///
/// ```
/// use pagelist_lib::storage::{Compression, StorageConfig};
///
/// let config = StorageConfig::default().with_compression(Compression::Zstd(3));
/// assert_eq!(config.compression, Compression::Zstd(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Transform applied to every stored value.
    ///
    /// Default: no compression
    pub compression: Compression,
}

impl StorageConfig {
    /// Creates a new storage config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression transform.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Shorthand for zstd at its default level.
    pub fn compressed() -> Self {
        Self {
            compression: Compression::Zstd(zstd::DEFAULT_COMPRESSION_LEVEL),
        }
    }
}
