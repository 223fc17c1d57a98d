//! Shared utilities for the tally engine.

pub mod stats;
pub mod sync;
pub mod time;

pub use stats::StatsCounter;
pub use sync::{lock, read, write};
pub use time::format_duration;
