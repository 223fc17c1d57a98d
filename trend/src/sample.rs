use serde::{Deserialize, Serialize};

use tally_types::{ContestantId, Timestamp, TrendDirection};

/// One recorded total for one contestant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSample {
    pub contestant_id: ContestantId,
    pub timestamp: Timestamp,
    pub total_at_sample: u64,
}

/// Change over a window and its classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub delta: i64,
    pub direction: TrendDirection,
}
