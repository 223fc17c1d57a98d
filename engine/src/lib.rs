//! Event engines — one self-contained tally pipeline per voting event.
//!
//! An [`EventEngine`] owns its tally store, trend tracker, snapshot publisher
//! and ingest gateway; nothing is shared between events. The
//! [`EngineRegistry`] maps event ids to engines and is what the HTTP and
//! websocket surfaces talk to.

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;

pub use config::EngineConfig;
pub use engine::{EventEngine, EventSummary};
pub use error::EngineError;
pub use registry::EngineRegistry;
