//! Fundamental types for the tally engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, timestamps and clocks, vote kinds, contestant tallies, and the
//! immutable leaderboard snapshot handed out to readers.

pub mod error;
pub mod ids;
pub mod leaderboard;
pub mod state;
pub mod tally;
pub mod time;
pub mod vote;

pub use error::TallyError;
pub use ids::{CategoryId, ContestantId, EventId, IdempotencyKey};
pub use leaderboard::{CategorySummary, LeaderboardSnapshot, Podium, RankEntry, TrendDirection};
pub use state::EventStatus;
pub use tally::{ContestantProfile, ContestantTally};
pub use time::{Clock, SystemClock, Timestamp};
pub use vote::{RejectReason, VoteKind};
