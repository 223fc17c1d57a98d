//! Snapshot publisher — packages ranking output into immutable, versioned
//! leaderboard snapshots.
//!
//! The current snapshot lives in a `tokio::sync::watch` channel: publishing
//! is a single value swap, pull readers clone the `Arc` that is current at
//! that instant, and push subscribers always wake up to the latest value,
//! skipping any versions they were too slow to observe.
//!
//! - [`publisher`] — tick cycle and snapshot distribution.
//! - [`view`] — category-scoped views derived from a snapshot.

pub mod publisher;
pub mod view;

pub use publisher::{PublisherState, SkipReason, SnapshotPublisher, TickOutcome};
pub use view::category_view;
