//! Nullable infrastructure for deterministic testing.
//!
//! Engine code reaches time and durable storage only through the `Clock` and
//! `TallyPersistence` traits. The implementations here:
//! - return deterministic values
//! - can be controlled programmatically
//! - never touch the filesystem
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod persistence;

pub use clock::NullClock;
pub use persistence::NullTallyPersistence;
