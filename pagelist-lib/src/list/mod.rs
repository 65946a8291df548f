//! Virtualized list over a remotely paginated result set.
//!
//! Only the rows inside the scroll window (plus a buffer) exist at any time.
//! Rows are produced by a [`RowRenderer`], placed at `index * row_height`,
//! and re-rendered in place when they are still loading after
//! [`ListConfig::stale_after`].

mod config;
mod engine;
mod range;
mod row;
mod slots;
mod viewport;

pub use config::ListConfig;
pub use engine::*;
pub use range::*;
pub use row::*;
pub use slots::*;
pub use viewport::*;
