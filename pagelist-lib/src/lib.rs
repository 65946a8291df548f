//! Pagelist client library
//!
//! Browse a very large, remotely paginated result set through a virtualized
//! list: only the visible window of rows exists, records are fetched in
//! blocks, duplicate requests are collapsed, and a cold backend is retried
//! without flooding it.

pub mod error;
pub mod list;
pub mod query;
pub mod records;
pub mod scheduler;
pub mod storage;
pub mod transport;

mod client;
#[cfg(test)]
mod testing;

pub use client::*;
pub use query::Query;
