//! WebSocket server for live leaderboards.
//!
//! Clients subscribe per event, optionally narrowed to one category, and
//! receive the current snapshot immediately and then every newly published
//! one. A client that reads slower than the publisher ticks skips straight
//! to the newest snapshot.

pub mod error;
pub mod server;
pub mod subscriptions;

pub use error::WsError;
pub use server::{router, WebSocketServer, WsState};
pub use subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage};
