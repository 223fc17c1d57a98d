//! Vote kinds and ingest rejection reasons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TallyError;

/// Whether a vote increment was free or paid for.
///
/// The engine only needs the distinction for the per-contestant split; pricing
/// happens upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Free,
    Paid,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteKind {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "paid" => Ok(Self::Paid),
            other => Err(TallyError::UnknownVoteKind(other.to_string())),
        }
    }
}

/// Why the ingest gateway did not apply an increment.
///
/// `Duplicate` is reported alongside `accepted = true`: a resubmitted
/// increment is a successful no-op, not a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    UnknownContestant,
    InvalidAmount,
    Duplicate,
    VotingPaused,
    EventClosed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownContestant => "UnknownContestant",
            Self::InvalidAmount => "InvalidAmount",
            Self::Duplicate => "Duplicate",
            Self::VotingPaused => "VotingPaused",
            Self::EventClosed => "EventClosed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
