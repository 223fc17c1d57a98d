//! Tally node: hosts event engines and drives them.
//!
//! The node is the coordinator that:
//! - Creates the configured events and restores their saved tallies
//! - Ticks each event's snapshot publisher on the update interval
//! - Samples totals for trend computation
//! - Periodically saves tallies to the data directory
//! - Serves the HTTP API and the WebSocket push channel

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod persistence;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{EventConfig, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::TallyNode;
pub use persistence::JsonFilePersistence;
pub use shutdown::ShutdownController;
