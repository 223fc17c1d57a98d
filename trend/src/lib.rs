//! Trend window tracking — rolling vote deltas per contestant.
//!
//! A sampler periodically records every contestant's total. Each series is a
//! ring buffer bounded both by age (the retention window) and by count, so
//! memory stays flat however long an event runs.
//!
//! - [`tracker`] — the sample store and window queries.
//! - [`sample`] — the sample and query result types.

pub mod sample;
pub mod tracker;

pub use sample::{Trend, TrendSample};
pub use tracker::{TrendTracker, DEFAULT_RETENTION, DEFAULT_SAMPLE_INTERVAL, DEFAULT_WINDOW};
