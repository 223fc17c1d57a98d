//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for the tally engine.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown vote kind: {0}")]
    UnknownVoteKind(String),

    #[error("unknown event status: {0}")]
    UnknownEventStatus(String),
}
