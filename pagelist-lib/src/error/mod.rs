//! Error types

mod api;
mod list;
mod storage;

pub use api::*;
pub use list::*;
pub use storage::*;

/// Top-level error for operations that cross component boundaries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Persistent storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The virtual list could not complete an operation.
    #[error(transparent)]
    List(#[from] ListError),
}
