//! Per-contestant tally records.

use serde::{Deserialize, Serialize};

use crate::{CategoryId, ContestantId, Timestamp};

/// Registration data for a contestant. Country and verification are carried
/// for display only and never influence ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantProfile {
    pub id: ContestantId,
    pub category: CategoryId,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

impl ContestantProfile {
    pub fn new(id: impl Into<ContestantId>, category: impl Into<CategoryId>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            country: None,
            verified: false,
        }
    }
}

/// A point-in-time copy of one contestant's counters.
///
/// The total is never stored: it is always `free + paid` of the same copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantTally {
    pub profile: ContestantProfile,
    pub free_votes: u64,
    pub paid_votes: u64,
    /// When the earliest increment was recorded, on the engine clock.
    pub first_vote_at: Option<Timestamp>,
}

impl ContestantTally {
    pub fn new(profile: ContestantProfile) -> Self {
        Self {
            profile,
            free_votes: 0,
            paid_votes: 0,
            first_vote_at: None,
        }
    }

    pub fn id(&self) -> &ContestantId {
        &self.profile.id
    }

    pub fn category(&self) -> &CategoryId {
        &self.profile.category
    }

    /// Total votes (`free + paid`).
    pub fn total(&self) -> u64 {
        self.free_votes.saturating_add(self.paid_votes)
    }
}
