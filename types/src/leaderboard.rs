//! Ranked leaderboard types.
//!
//! A [`LeaderboardSnapshot`] is built once per publisher tick and shared with
//! readers behind an `Arc`; nothing mutates it after construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CategoryId, ContestantId, EventId, Timestamp};

/// Direction of a contestant's vote count over the trend window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Neutral,
}

impl TrendDirection {
    /// Classify a delta. Changes within `epsilon` of zero are neutral so a
    /// trickle of votes does not make labels flap.
    pub fn classify(delta: i64, epsilon: u64) -> Self {
        if delta.unsigned_abs() <= epsilon {
            Self::Neutral
        } else if delta > 0 {
            Self::Up
        } else {
            Self::Down
        }
    }
}

/// One ranked row of a leaderboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub contestant_id: ContestantId,
    pub category_id: CategoryId,
    /// 1-based, contiguous within the snapshot (or view) it belongs to.
    pub rank: u32,
    pub total_votes: u64,
    pub free_votes: u64,
    pub paid_votes: u64,
    /// Share of the snapshot's (or view's) total, in percent.
    pub vote_percentage: f64,
    pub last_24h_change: i64,
    pub trend_direction: TrendDirection,
    /// Previous rank minus current rank; positive means the contestant climbed.
    pub rank_movement: i64,
    pub country: Option<String>,
    pub verified: bool,
}

/// The top three entries of a leaderboard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Podium {
    pub first: Option<RankEntry>,
    pub second: Option<RankEntry>,
    pub third: Option<RankEntry>,
}

impl Podium {
    /// Take the first three of an already ordered entry list.
    pub fn from_ordered(entries: &[RankEntry]) -> Self {
        let mut top = entries.iter().take(3).cloned();
        Self {
            first: top.next(),
            second: top.next(),
            third: top.next(),
        }
    }
}

/// Per-category aggregate carried on each snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_id: CategoryId,
    pub contestant_count: usize,
    pub total_votes: u64,
    pub leader: Option<ContestantId>,
}

/// An immutable, fully ordered leaderboard computed at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub event_id: EventId,
    /// Strictly increasing per event; version 0 is the empty bootstrap snapshot.
    pub version: u64,
    pub generated_at: Timestamp,
    pub total_votes: u64,
    pub categories: Vec<CategorySummary>,
    pub entries: Vec<RankEntry>,
    pub podium: Podium,
}

impl LeaderboardSnapshot {
    /// Assemble a snapshot from ordered entries. Category summaries and the
    /// podium are derived here so they can never disagree with `entries`.
    pub fn new(
        event_id: EventId,
        version: u64,
        generated_at: Timestamp,
        total_votes: u64,
        entries: Vec<RankEntry>,
    ) -> Self {
        let podium = Podium::from_ordered(&entries);
        let categories = summarize_categories(&entries);
        Self {
            event_id,
            version,
            generated_at,
            total_votes,
            categories,
            entries,
            podium,
        }
    }

    /// The snapshot readers see before the first tick.
    pub fn empty(event_id: EventId, generated_at: Timestamp) -> Self {
        Self::new(event_id, 0, generated_at, 0, Vec::new())
    }

    pub fn entry(&self, contestant: &ContestantId) -> Option<&RankEntry> {
        self.entries.iter().find(|e| &e.contestant_id == contestant)
    }

    pub fn rank_of(&self, contestant: &ContestantId) -> Option<u32> {
        self.entry(contestant).map(|e| e.rank)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn summarize_categories(entries: &[RankEntry]) -> Vec<CategorySummary> {
    let mut by_category: BTreeMap<&CategoryId, CategorySummary> = BTreeMap::new();
    for entry in entries {
        let summary = by_category
            .entry(&entry.category_id)
            .or_insert_with(|| CategorySummary {
                category_id: entry.category_id.clone(),
                contestant_count: 0,
                total_votes: 0,
                // Entries are ordered, so the first one seen leads its category.
                leader: Some(entry.contestant_id.clone()),
            });
        summary.contestant_count += 1;
        summary.total_votes = summary.total_votes.saturating_add(entry.total_votes);
    }
    by_category.into_values().collect()
}
