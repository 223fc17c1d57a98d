//! WebSocket server implementation.
//!
//! Accepts connections at `/ws`. Each subscription spawns a forwarder task
//! that waits on the event's snapshot channel and pushes whatever snapshot is
//! current when it wakes, so a slow socket never makes the publisher wait and
//! never receives a backlog.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tally_engine::EngineRegistry;
use tally_publisher::category_view;
use tally_types::{CategoryId, EventId, LeaderboardSnapshot};

use crate::error::WsError;
use crate::subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage, SnapshotFrame};

/// Shared state for the WebSocket server.
pub struct WsState {
    pub registry: Arc<EngineRegistry>,
}

impl WsState {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }
}

pub fn router(state: Arc<WsState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// The WebSocket server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    pub fn new(port: u16, registry: Arc<EngineRegistry>) -> Self {
        Self {
            port,
            state: Arc::new(WsState::new(registry)),
        }
    }

    /// Listen for WebSocket connections until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), WsError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| WsError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(%addr, "WebSocket server listening");
        axum::serve(listener, router(Arc::clone(&self.state)))
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Forwarders = HashMap<EventId, JoinHandle<()>>;

/// Handle a single WebSocket connection until the client goes away, then
/// abort its forwarders.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(ws_sender));

    let mut client_subs = ClientSubscriptions::new();
    let mut forwarders = Forwarders::new();

    debug!("WebSocket client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handle_text_message(&text, &state, &mut client_subs, &mut forwarders, &ws_sender)
                    .await;
            }
            Message::Close(_) => break,
            Message::Ping(data) => {
                let _ = ws_sender.lock().await.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    for (event_id, handle) in forwarders.drain() {
        debug!(event = %event_id, "aborting forwarder");
        handle.abort();
    }
    debug!("WebSocket client disconnected");
}

async fn handle_text_message<S>(
    text: &str,
    state: &WsState,
    client_subs: &mut ClientSubscriptions,
    forwarders: &mut Forwarders,
    ws_sender: &Arc<Mutex<S>>,
) where
    S: Sink<Message> + Unpin + Send + 'static,
{
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Err(e) => ServerMessage::Error {
            message: format!("invalid message: {e}"),
        },
        Ok(ClientMessage::Subscribe {
            event_id,
            category_id,
        }) => match state.registry.get(&event_id) {
            Err(e) => ServerMessage::Error {
                message: e.to_string(),
            },
            Ok(engine) => {
                if let Some(old) = forwarders.remove(&event_id) {
                    old.abort();
                }
                client_subs.subscribe(event_id.clone(), category_id.clone());

                // Ack before the forwarder can push the first snapshot.
                let ack = ServerMessage::Ack {
                    action: "subscribe".into(),
                    event_id: event_id.clone(),
                };
                send_json(ws_sender, &ack).await;

                let handle = tokio::spawn(forward_snapshots(
                    engine.subscribe(),
                    Arc::clone(ws_sender),
                    category_id,
                ));
                forwarders.insert(event_id.clone(), handle);
                debug!(event = %event_id, "client subscribed");
                return;
            }
        },
        Ok(ClientMessage::Unsubscribe { event_id }) => {
            if let Some(handle) = forwarders.remove(&event_id) {
                handle.abort();
            }
            if client_subs.unsubscribe(&event_id) {
                ServerMessage::Ack {
                    action: "unsubscribe".into(),
                    event_id,
                }
            } else {
                ServerMessage::Error {
                    message: format!("not subscribed to {event_id}"),
                }
            }
        }
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
    };
    send_json(ws_sender, &reply).await;
}

/// Push the current snapshot, then each newer one, until the publisher goes
/// away or the socket fails.
pub async fn forward_snapshots<S>(
    mut rx: watch::Receiver<Arc<LeaderboardSnapshot>>,
    ws_sender: Arc<Mutex<S>>,
    category: Option<CategoryId>,
) where
    S: Sink<Message> + Unpin + Send,
{
    loop {
        let snapshot = Arc::clone(&rx.borrow_and_update());
        let text = match &category {
            Some(category) => encode(&SnapshotFrame::new(
                &category_view(&snapshot, category),
                Some(category),
            )),
            None => encode(&SnapshotFrame::new(&snapshot, None)),
        };
        if let Some(text) = text {
            if ws_sender.lock().await.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        if rx.changed().await.is_err() {
            debug!("snapshot channel closed");
            break;
        }
    }
}

async fn send_json<S, T>(ws_sender: &Arc<Mutex<S>>, message: &T)
where
    S: Sink<Message> + Unpin,
    T: Serialize,
{
    if let Some(text) = encode(message) {
        let _ = ws_sender.lock().await.send(Message::Text(text)).await;
    }
}

fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "failed to encode WebSocket message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tally_engine::{EngineConfig, EventEngine};
    use tally_ingest::VoteSubmission;
    use tally_nullables::NullClock;
    use tally_types::{ContestantId, ContestantProfile, IdempotencyKey, Timestamp, VoteKind};

    /// Collects sent text frames.
    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<String>,
    }

    impl Sink<Message> for RecordingSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
            if let Message::Text(text) = item {
                self.frames.push(text);
            }
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn registry() -> (Arc<EngineRegistry>, Arc<EventEngine>) {
        let registry = Arc::new(EngineRegistry::new(
            EngineConfig::default(),
            Arc::new(NullClock::new(50)),
        ));
        let engine = registry.create_event(EventId::new("finals"), "Finals").unwrap();
        engine
            .register_contestant(ContestantProfile::new("A", "solo"))
            .unwrap();
        engine
            .register_contestant(ContestantProfile::new("B", "group"))
            .unwrap();
        (registry, engine)
    }

    fn vote(engine: &EventEngine, who: &str, category: &str, key: &str) {
        engine.submit(&VoteSubmission {
            contestant_id: ContestantId::new(who),
            category_id: CategoryId::new(category),
            vote_kind: VoteKind::Free,
            amount: 1,
            idempotency_key: IdempotencyKey::new(key),
            occurred_at: Timestamp::from_secs(50),
        });
    }

    fn frames(sink: &Arc<Mutex<RecordingSink>>) -> Vec<serde_json::Value> {
        sink.try_lock()
            .unwrap()
            .frames
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn forwarder_sends_current_then_latest() {
        let (_, engine) = registry();
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let handle = tokio::spawn(forward_snapshots(engine.subscribe(), Arc::clone(&sink), None));
        tokio::task::yield_now().await;

        for i in 0..3 {
            vote(&engine, "A", "solo", &i.to_string());
            engine.tick();
        }
        // Give the forwarder a chance to wake on the last change.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        handle.abort();

        let frames = frames(&sink);
        assert_eq!(frames[0]["snapshot"]["version"], 0);
        let versions: Vec<u64> = frames
            .iter()
            .map(|f| f["snapshot"]["version"].as_u64().unwrap())
            .collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*versions.last().unwrap(), 3);
    }

    #[tokio::test]
    async fn forwarder_applies_category_view() {
        let (_, engine) = registry();
        vote(&engine, "A", "solo", "1");
        vote(&engine, "B", "group", "2");
        engine.tick();

        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let handle = tokio::spawn(forward_snapshots(
            engine.subscribe(),
            Arc::clone(&sink),
            Some(CategoryId::new("group")),
        ));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        handle.abort();

        let frames = frames(&sink);
        assert_eq!(frames[0]["category_id"], "group");
        let entries = frames[0]["snapshot"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["contestant_id"], "B");
        assert_eq!(entries[0]["rank"], 1);
    }

    #[tokio::test]
    async fn text_messages_drive_subscriptions() {
        let (registry, _) = registry();
        let state = WsState::new(registry);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let mut subs = ClientSubscriptions::new();
        let mut forwarders = Forwarders::new();

        handle_text_message(r#"{"action":"subscribe","event_id":"finals"}"#, &state, &mut subs, &mut forwarders, &sink).await;
        assert_eq!(subs.len(), 1);
        assert_eq!(forwarders.len(), 1);

        handle_text_message(r#"{"action":"subscribe","event_id":"ghost"}"#, &state, &mut subs, &mut forwarders, &sink).await;
        handle_text_message(r#"{"action":"unsubscribe","event_id":"finals"}"#, &state, &mut subs, &mut forwarders, &sink).await;
        handle_text_message("not json", &state, &mut subs, &mut forwarders, &sink).await;
        handle_text_message(r#"{"action":"ping"}"#, &state, &mut subs, &mut forwarders, &sink).await;
        assert!(subs.is_empty());
        assert!(forwarders.is_empty());

        let types: Vec<String> = frames(&sink)
            .iter()
            .map(|f| f["type"].as_str().unwrap().to_string())
            .filter(|t| t != "snapshot")
            .collect();
        assert_eq!(types, vec!["ack", "error", "ack", "error", "pong"]);
    }
}
