//! Block-paginated record store.
//!
//! Single-record lookups over a remote collection. The index space of each
//! query is cut into fixed-size [`Block`]s; a miss fetches the whole block and
//! fans it out to every caller waiting on an index inside it.

mod block;
mod config;
mod store;

pub use block::Block;
pub use config::RecordStoreConfig;
pub use store::*;
