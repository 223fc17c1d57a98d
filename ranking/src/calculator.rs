//! Rank assignment, vote shares, trend and movement.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tally_store::TallyView;
use tally_trend::{TrendTracker, DEFAULT_WINDOW};
use tally_types::{ContestantId, LeaderboardSnapshot, RankEntry};

use crate::order::order_tallies;

/// Tunables for one ranking pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankingParams {
    /// Lookback for `last_24h_change`.
    pub trend_window: Duration,
    /// Deltas within this many votes of zero are `Neutral`.
    pub trend_epsilon: u64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            trend_window: DEFAULT_WINDOW,
            trend_epsilon: 0,
        }
    }
}

/// Output of one ranking pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranking {
    pub entries: Vec<RankEntry>,
    /// Sum of all totals, computed once from the same view.
    pub total_votes: u64,
}

/// Percentage of `total` in `sum`; 0 when nothing has been voted.
pub fn vote_percentage(total: u64, sum: u64) -> f64 {
    if sum == 0 {
        return 0.0;
    }
    (total as f64 * 100.0) / sum as f64
}

/// Computes rankings and remembers the last published snapshot so rank
/// movement is an explicit comparison against it.
pub struct RankingCalculator {
    params: RankingParams,
    previous: Option<Arc<LeaderboardSnapshot>>,
}

impl RankingCalculator {
    pub fn new(params: RankingParams) -> Self {
        Self {
            params,
            previous: None,
        }
    }

    pub fn params(&self) -> RankingParams {
        self.params
    }

    /// Rank every contestant in `view`.
    ///
    /// Does not mutate anything; calling it twice with the same inputs yields
    /// identical output.
    pub fn compute(&self, view: &TallyView, trend: &TrendTracker) -> Ranking {
        let previous_ranks: HashMap<&ContestantId, u32> = self
            .previous
            .as_deref()
            .map(|snapshot| {
                snapshot
                    .entries
                    .iter()
                    .map(|e| (&e.contestant_id, e.rank))
                    .collect()
            })
            .unwrap_or_default();

        let mut ordered: Vec<_> = view.tallies.iter().collect();
        order_tallies(&mut ordered);

        let total_votes = view.total_votes();
        let now = view.taken_at;

        let entries = ordered
            .into_iter()
            .zip(1u32..)
            .map(|(tally, rank)| {
                let total = tally.total();
                let change = trend.trend(
                    tally.id(),
                    self.params.trend_window,
                    self.params.trend_epsilon,
                    now,
                    total,
                );
                let rank_movement = previous_ranks
                    .get(tally.id())
                    .map(|&prev| i64::from(prev) - i64::from(rank))
                    .unwrap_or(0);
                RankEntry {
                    contestant_id: tally.id().clone(),
                    category_id: tally.category().clone(),
                    rank,
                    total_votes: total,
                    free_votes: tally.free_votes,
                    paid_votes: tally.paid_votes,
                    vote_percentage: vote_percentage(total, total_votes),
                    last_24h_change: change.delta,
                    trend_direction: change.direction,
                    rank_movement,
                    country: tally.profile.country.clone(),
                    verified: tally.profile.verified,
                }
            })
            .collect();

        Ranking {
            entries,
            total_votes,
        }
    }

    /// Make `snapshot` the baseline for the next pass's rank movement.
    pub fn remember(&mut self, snapshot: Arc<LeaderboardSnapshot>) {
        self.previous = Some(snapshot);
    }

    pub fn previous(&self) -> Option<&Arc<LeaderboardSnapshot>> {
        self.previous.as_ref()
    }
}

impl Default for RankingCalculator {
    fn default() -> Self {
        Self::new(RankingParams::default())
    }
}
