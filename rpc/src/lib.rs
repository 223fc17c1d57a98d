//! HTTP/JSON API for the tally node.
//!
//! Provides endpoints for:
//! - Vote increment submission
//! - Leaderboard snapshots, full or per category
//! - Per-contestant trend queries
//! - Pausing and resuming ingest
//! - Event listing and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use handlers::RpcState;
pub use server::{router, RpcServer};
