//! Lifecycle state of a voting event.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::TallyError;

/// Whether an event accepts vote increments.
///
/// Pausing is a separate, reversible control; a closed event never reopens
/// through the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Live,
    Closed,
}

impl EventStatus {
    /// Whether increments may be applied in this state.
    pub fn accepts_votes(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl FromStr for EventStatus {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "closed" => Ok(Self::Closed),
            other => Err(TallyError::UnknownEventStatus(other.to_string())),
        }
    }
}
