use thiserror::Error;

use tally_types::ContestantId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown contestant: {0}")]
    UnknownContestant(ContestantId),

    #[error("invalid amount {0}: increments must be positive")]
    InvalidAmount(i64),

    #[error("contestant already registered: {0}")]
    ContestantExists(ContestantId),

    #[error("restore would lower {contestant}: stored {stored}, restoring {restoring}")]
    NonMonotonicRestore {
        contestant: ContestantId,
        stored: u64,
        restoring: u64,
    },

    #[error("persistence backend error: {0}")]
    Backend(String),
}
