//! Ranking calculator — turns a tally view into an ordered leaderboard.
//!
//! Ordering is total votes descending, then earliest recorded vote
//! ascending, then contestant id ascending. Contestants that have never
//! received a vote sort after those that have when totals tie. The pass is a
//! pure function of the tally view, the trend tracker and the previously
//! published snapshot.

pub mod calculator;
pub mod order;

pub use calculator::{vote_percentage, Ranking, RankingCalculator, RankingParams};
pub use order::{compare_tallies, order_tallies};
