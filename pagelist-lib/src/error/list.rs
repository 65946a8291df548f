//! Virtual list error types

/// Errors raised by [`VirtualList`](crate::list::VirtualList) operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ListError {
    /// The viewport's container is not attached, so nothing can be measured
    /// or rendered.
    #[error("Container for list '{list}' not found")]
    ContainerMissing {
        /// Identity of the list.
        list: String,
    },
}

impl ListError {
    /// Creates a container-missing error for the given list.
    pub fn container_missing(list: impl Into<String>) -> Self {
        Self::ContainerMissing { list: list.into() }
    }
}
