//! String-backed identifiers for events, categories, contestants and
//! idempotency keys.
//!
//! Identifiers are opaque to the engine. Their only required property is a
//! total order, which the ranking pass uses as the final tie-break.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TallyError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a raw string.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Create an identifier, rejecting empty or whitespace-only input.
            pub fn parse(raw: &str) -> Result<Self, TallyError> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(TallyError::InvalidId(format!("empty {}", $what)));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Return the raw identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifies one voting event. Each event runs its own engine instance.
    EventId,
    "event id"
);

string_id!(
    /// Identifies a category (award, division) inside an event.
    CategoryId,
    "category id"
);

string_id!(
    /// Identifies a contestant. Unique within an event.
    ContestantId,
    "contestant id"
);

string_id!(
    /// Caller-supplied token that makes a vote increment apply at most once.
    IdempotencyKey,
    "idempotency key"
);
