//! Ingest gateway — the boundary where upstream vote increments enter an
//! event's tally store.
//!
//! Every submission gets a typed answer; nothing here panics or partially
//! applies an increment.

pub mod gateway;
pub mod submission;

pub use gateway::{IngestGateway, IngestStats};
pub use submission::{IngestResponse, VoteSubmission};
