//! Subscription management for WebSocket clients.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tally_types::{CategoryId, EventId, LeaderboardSnapshot};

/// A message from a client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Stream one event's leaderboard, or one category of it.
    Subscribe {
        event_id: EventId,
        #[serde(default)]
        category_id: Option<CategoryId>,
    },
    Unsubscribe {
        event_id: EventId,
    },
    Ping,
}

/// A control message to a client. Snapshots go out as [`SnapshotFrame`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Ack { action: String, event_id: EventId },
    Error { message: String },
    Pong,
}

/// One pushed leaderboard.
#[derive(Serialize)]
pub struct SnapshotFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<&'a CategoryId>,
    pub snapshot: &'a LeaderboardSnapshot,
}

impl<'a> SnapshotFrame<'a> {
    pub fn new(snapshot: &'a LeaderboardSnapshot, category_id: Option<&'a CategoryId>) -> Self {
        Self {
            kind: "snapshot",
            category_id,
            snapshot,
        }
    }
}

/// One client's active subscriptions: event → optional category filter.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    events: HashMap<EventId, Option<CategoryId>>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe, replacing any earlier filter for the same event.
    pub fn subscribe(&mut self, event_id: EventId, category: Option<CategoryId>) {
        self.events.insert(event_id, category);
    }

    /// Returns whether the client was subscribed.
    pub fn unsubscribe(&mut self, event_id: &EventId) -> bool {
        self.events.remove(event_id).is_some()
    }

    pub fn filter(&self, event_id: &EventId) -> Option<&Option<CategoryId>> {
        self.events.get(event_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::Timestamp;

    #[test]
    fn parses_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","event_id":"finals","category_id":"solo"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                event_id: EventId::new("finals"),
                category_id: Some(CategoryId::new("solo")),
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","event_id":"finals"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { category_id: None, .. }));

        let msg: ClientMessage = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"dance"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let ack = ServerMessage::Ack {
            action: "subscribe".into(),
            event_id: EventId::new("e"),
        };
        assert_eq!(
            serde_json::to_string(&ack).unwrap(),
            r#"{"type":"ack","action":"subscribe","event_id":"e"}"#
        );
        assert_eq!(serde_json::to_string(&ServerMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn snapshot_frame_shape() {
        let snapshot = LeaderboardSnapshot::empty(EventId::new("e"), Timestamp::from_secs(1));
        let value = serde_json::to_value(SnapshotFrame::new(&snapshot, None)).unwrap();
        assert_eq!(value["type"], "snapshot");
        assert!(value.get("category_id").is_none());
        assert_eq!(value["snapshot"]["version"], 0);
    }

    #[test]
    fn resubscribe_replaces_filter() {
        let mut subs = ClientSubscriptions::new();
        let event = EventId::new("e");
        subs.subscribe(event.clone(), None);
        subs.subscribe(event.clone(), Some(CategoryId::new("c")));
        assert_eq!(subs.len(), 1);
        assert_eq!(subs.filter(&event), Some(&Some(CategoryId::new("c"))));
        assert!(subs.unsubscribe(&event));
        assert!(!subs.unsubscribe(&event));
        assert!(subs.is_empty());
    }
}
