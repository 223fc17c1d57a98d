//! Point-in-time copies of the tally store.

use tally_types::{ContestantId, ContestantTally, Timestamp};

/// A copy of every contestant's counters, taken in one pass over the store.
///
/// Each contestant's `(free, paid)` pair is read under that contestant's lock,
/// so no row is ever observed mid-update. Rows are in registration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyView {
    pub taken_at: Timestamp,
    pub tallies: Vec<ContestantTally>,
}

impl TallyView {
    pub fn new(taken_at: Timestamp, tallies: Vec<ContestantTally>) -> Self {
        Self { taken_at, tallies }
    }

    pub fn get(&self, contestant: &ContestantId) -> Option<&ContestantTally> {
        self.tallies.iter().find(|t| t.id() == contestant)
    }

    /// Sum of all totals in this view.
    pub fn total_votes(&self) -> u64 {
        self.tallies
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.total()))
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }
}
