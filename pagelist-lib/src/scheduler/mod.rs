//! Request deduplication and retry scheduling.
//!
//! Every remote request is keyed by its path. The [`RequestScheduler`] keeps
//! one record per path, lets at most one attempt run at a time, serves
//! completed responses from memory, and re-issues requests that are due from a
//! periodic scan.

mod config;
mod dedup;

pub use config::SchedulerConfig;
pub use dedup::*;
