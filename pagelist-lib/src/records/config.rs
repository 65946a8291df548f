//! Record store configuration.

/// Configuration for the [`RecordStore`](super::RecordStore).
///
/// # Example
///
/// ```
/// use pagelist_lib::records::RecordStoreConfig;
///
/// let config = RecordStoreConfig::default().with_block_size(25);
/// assert_eq!(config.block_size, 25);
/// ```
#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    /// Records per block request.
    ///
    /// Default: 50
    pub block_size: usize,
    /// Value of the intent field that asks for a count instead of records.
    ///
    /// Default: `collectionsetcount`
    pub count_intent: String,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            block_size: 50,
            count_intent: "collectionsetcount".to_string(),
        }
    }
}

impl RecordStoreConfig {
    /// Sets the block size. Zero is treated as one.
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    /// Sets the count intent marker.
    pub fn with_count_intent(mut self, intent: impl Into<String>) -> Self {
        self.count_intent = intent.into();
        self
    }
}
