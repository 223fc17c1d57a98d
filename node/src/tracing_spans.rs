//! Pre-built [`tracing::Span`] constructors for recurring node operations.
//!
//! Consistent span names and fields keep ticks, samples and persistence
//! passes easy to filter and correlate across events.

use tracing::{debug_span, info_span, Span};

/// One publisher tick of one event.
pub fn tick_span(event_id: &str) -> Span {
    debug_span!("tick", event = %event_id)
}

/// One trend sampling pass of one event.
pub fn sample_span(event_id: &str) -> Span {
    debug_span!("sample", event = %event_id)
}

/// Saving or restoring one event's tallies.
pub fn persist_span(event_id: &str, action: &str) -> Span {
    info_span!("persist", event = %event_id, action = %action)
}

/// The HTTP API server.
pub fn rpc_span(port: u16) -> Span {
    info_span!("rpc", port = port)
}

/// The WebSocket push server.
pub fn websocket_span(port: u16) -> Span {
    info_span!("websocket", port = port)
}
