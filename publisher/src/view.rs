//! Category-scoped leaderboard views.
//!
//! A view is derived on demand and never stored: entries are filtered to one
//! category, ranks are reassigned from 1, and shares are recomputed against
//! the category subtotal. Trend fields and rank movement are carried over
//! from the event-wide board.

use tally_ranking::vote_percentage;
use tally_types::{CategoryId, LeaderboardSnapshot, RankEntry};

/// Derive the view of `snapshot` restricted to `category`.
///
/// An unknown category yields an empty board with the snapshot's version.
pub fn category_view(snapshot: &LeaderboardSnapshot, category: &CategoryId) -> LeaderboardSnapshot {
    let subtotal = snapshot
        .entries
        .iter()
        .filter(|e| &e.category_id == category)
        .fold(0u64, |acc, e| acc.saturating_add(e.total_votes));

    let entries: Vec<RankEntry> = snapshot
        .entries
        .iter()
        .filter(|e| &e.category_id == category)
        .zip(1u32..)
        .map(|(entry, rank)| RankEntry {
            rank,
            vote_percentage: vote_percentage(entry.total_votes, subtotal),
            ..entry.clone()
        })
        .collect();

    LeaderboardSnapshot::new(
        snapshot.event_id.clone(),
        snapshot.version,
        snapshot.generated_at,
        subtotal,
        entries,
    )
}
