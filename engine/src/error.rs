use thiserror::Error;

use tally_types::{ContestantId, EventId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("event already exists: {0}")]
    EventExists(EventId),

    #[error("contestant not found: {0}")]
    ContestantNotFound(ContestantId),

    #[error("store error: {0}")]
    Store(#[from] tally_store::StoreError),
}
