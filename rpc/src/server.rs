//! Axum-based RPC server.

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::error::RpcError;
use crate::handlers::{
    get_leaderboard, get_metrics, get_trend, list_events, pause_ingest, resume_ingest,
    submit_vote, RpcState,
};

/// Build the RPC router.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/:event/votes", post(submit_vote))
        .route("/events/:event/leaderboard", get(get_leaderboard))
        .route("/events/:event/trend/:contestant", get(get_trend))
        .route("/events/:event/pause", post(pause_ingest))
        .route("/events/:event/resume", post(resume_ingest))
        .route("/metrics", get(get_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: RpcState,
}

impl RpcServer {
    pub fn new(port: u16, state: RpcState) -> Self {
        Self { port, state }
    }

    /// Serve until `shutdown` resolves. In-flight requests are allowed to
    /// finish.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {addr}: {e}")))?;
        tracing::info!(%addr, "RPC server listening");
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use tally_engine::{EngineConfig, EngineRegistry};
    use tally_nullables::NullClock;
    use tally_types::{ContestantProfile, EventId, LeaderboardSnapshot};

    fn state() -> RpcState {
        let registry = Arc::new(EngineRegistry::new(
            EngineConfig::default(),
            Arc::new(NullClock::new(10_000)),
        ));
        let engine = registry.create_event(EventId::new("finals"), "Finals").unwrap();
        for (id, category) in [("A", "solo"), ("B", "solo"), ("C", "group")] {
            engine
                .register_contestant(ContestantProfile::new(id, category))
                .unwrap();
        }
        RpcState::new(registry)
    }

    async fn send(app: &Router, method: &str, path: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn json(app: &Router, method: &str, path: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let (status, bytes) = send(app, method, path, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!(
                "JSON parse error: {} (status={}, body={:?})",
                e,
                status,
                String::from_utf8_lossy(&bytes)
            )
        });
        (status, value)
    }

    fn vote_body(contestant: &str, category: &str, amount: i64, key: &str) -> String {
        serde_json::json!({
            "contestantId": contestant,
            "categoryId": category,
            "voteKind": "free",
            "amount": amount,
            "idempotencyKey": key,
            "occurredAt": 10_000_000,
        })
        .to_string()
    }

    #[tokio::test]
    async fn vote_then_leaderboard() {
        let state = state();
        let registry = Arc::clone(&state.registry);
        let app = router(state);

        let (status, body) = json(&app, "POST", "/events/finals/votes", Some(&vote_body("B", "solo", 10, "k1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], true);

        let (_, body) = json(&app, "POST", "/events/finals/votes", Some(&vote_body("B", "solo", 10, "k1"))).await;
        assert_eq!(body["accepted"], true);
        assert_eq!(body["reason"], "Duplicate");

        registry.get(&EventId::new("finals")).unwrap().tick();

        let (status, bytes) = send(&app, "GET", "/events/finals/leaderboard", None).await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: LeaderboardSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.total_votes, 10);
        assert_eq!(snapshot.entries[0].contestant_id.as_str(), "B");
    }

    #[tokio::test]
    async fn rejected_vote_is_still_ok_status() {
        let app = router(state());
        let (status, body) = json(&app, "POST", "/events/finals/votes", Some(&vote_body("A", "group", 1, "k"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], false);
        assert_eq!(body["reason"], "UnknownContestant");
    }

    #[tokio::test]
    async fn malformed_vote_is_bad_request() {
        let app = router(state());
        let (status, body) = json(&app, "POST", "/events/finals/votes", Some("{\"amount\": 3}")).await;
        assert!(status.is_client_error());
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let app = router(state());
        let (status, body) = json(&app, "GET", "/events/nope/leaderboard", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "event not found: nope");
        let (status, _) = json(&app, "POST", "/events/nope/pause", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn category_leaderboard_filters_entries() {
        let state = state();
        let registry = Arc::clone(&state.registry);
        let app = router(state);
        json(&app, "POST", "/events/finals/votes", Some(&vote_body("A", "solo", 3, "1"))).await;
        json(&app, "POST", "/events/finals/votes", Some(&vote_body("C", "group", 9, "2"))).await;
        registry.get(&EventId::new("finals")).unwrap().tick();

        let (_, body) = json(&app, "GET", "/events/finals/leaderboard?category=solo", None).await;
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["contestant_id"], "A");
        assert_eq!(entries[0]["vote_percentage"], 100.0);
    }

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let app = router(state());
        let (status, body) = json(&app, "POST", "/events/finals/pause", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paused"], true);

        let (_, body) = json(&app, "POST", "/events/finals/votes", Some(&vote_body("A", "solo", 1, "k"))).await;
        assert_eq!(body["reason"], "VotingPaused");

        let (_, body) = json(&app, "POST", "/events/finals/resume", None).await;
        assert_eq!(body["paused"], false);
        let (_, body) = json(&app, "POST", "/events/finals/votes", Some(&vote_body("A", "solo", 1, "k"))).await;
        assert_eq!(body["accepted"], true);
    }

    #[tokio::test]
    async fn trend_endpoint() {
        let app = router(state());
        let (status, body) = json(&app, "GET", "/events/finals/trend/A?window_secs=3600", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delta"], 0);
        assert_eq!(body["direction"], "neutral");
        assert_eq!(body["window_secs"], 3600);

        let (status, _) = json(&app, "GET", "/events/finals/trend/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = json(&app, "GET", "/events/finals/trend/A?window_secs=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn events_listing() {
        let app = router(state());
        let (status, body) = json(&app, "GET", "/events", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"][0]["event_id"], "finals");
        assert_eq!(body["events"][0]["contestants"], 3);
    }

    #[tokio::test]
    async fn metrics_endpoint_requires_registry() {
        let app = router(state());
        let (status, _) = send(&app, "GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let registry = prometheus::Registry::new();
        let counter = prometheus::IntCounter::new("tally_test_total", "test counter").unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.inc();
        let app = router(state().with_metrics(registry));
        let (status, bytes) = send(&app, "GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(bytes).unwrap().contains("tally_test_total 1"));
    }
}
