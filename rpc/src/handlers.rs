//! RPC request handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};

use tally_engine::{EngineRegistry, EventSummary};
use tally_ingest::{IngestResponse, VoteSubmission};
use tally_types::{CategoryId, ContestantId, EventId, LeaderboardSnapshot, TrendDirection};

use crate::error::RpcError;

/// Shared handler state.
#[derive(Clone)]
pub struct RpcState {
    pub registry: Arc<EngineRegistry>,
    /// Encoded at `/metrics` when present.
    pub metrics: Option<Registry>,
}

impl RpcState {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Registry) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Serialises a shared snapshot without copying it first.
pub struct SnapshotJson(pub Arc<LeaderboardSnapshot>);

impl IntoResponse for SnapshotJson {
    fn into_response(self) -> Response {
        match serde_json::to_vec(self.0.as_ref()) {
            Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(e) => RpcError::Server(e.to_string()).into_response(),
        }
    }
}

// ── Ingest ───────────────────────────────────────────────────────────────

pub async fn submit_vote(
    State(state): State<RpcState>,
    Path(event): Path<String>,
    payload: Result<Json<VoteSubmission>, JsonRejection>,
) -> Result<Json<IngestResponse>, RpcError> {
    let Json(submission) = payload.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let response = state.registry.submit(&EventId::new(event), &submission)?;
    Ok(Json(response))
}

// ── Leaderboard ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub category: Option<String>,
}

pub async fn get_leaderboard(
    State(state): State<RpcState>,
    Path(event): Path<String>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<SnapshotJson, RpcError> {
    let Query(query) = query.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let category = query
        .category
        .as_deref()
        .map(CategoryId::parse)
        .transpose()
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let snapshot = state
        .registry
        .leaderboard(&EventId::new(event), category.as_ref())?;
    Ok(SnapshotJson(snapshot))
}

// ── Trend ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub window_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendResponse {
    pub contestant_id: ContestantId,
    pub window_secs: u64,
    pub delta: i64,
    pub direction: TrendDirection,
}

pub async fn get_trend(
    State(state): State<RpcState>,
    Path((event, contestant)): Path<(String, String)>,
    query: Result<Query<TrendQuery>, QueryRejection>,
) -> Result<Json<TrendResponse>, RpcError> {
    let Query(query) = query.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let window = match query.window_secs {
        Some(0) => return Err(RpcError::InvalidRequest("window_secs must be positive".into())),
        Some(secs) => Duration::from_secs(secs),
        None => state.registry.config().trend_window,
    };
    let contestant = ContestantId::new(contestant);
    let trend = state
        .registry
        .trend(&EventId::new(event), &contestant, window)?;
    Ok(Json(TrendResponse {
        contestant_id: contestant,
        window_secs: window.as_secs(),
        delta: trend.delta,
        direction: trend.direction,
    }))
}

// ── Control ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub event_id: EventId,
    pub paused: bool,
}

pub async fn pause_ingest(
    State(state): State<RpcState>,
    Path(event): Path<String>,
) -> Result<Json<ControlResponse>, RpcError> {
    let event_id = EventId::new(event);
    state.registry.pause_ingest(&event_id)?;
    Ok(Json(ControlResponse {
        event_id,
        paused: true,
    }))
}

pub async fn resume_ingest(
    State(state): State<RpcState>,
    Path(event): Path<String>,
) -> Result<Json<ControlResponse>, RpcError> {
    let event_id = EventId::new(event);
    state.registry.resume_ingest(&event_id)?;
    Ok(Json(ControlResponse {
        event_id,
        paused: false,
    }))
}

// ── Events ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventSummary>,
}

pub async fn list_events(State(state): State<RpcState>) -> Json<EventsResponse> {
    Json(EventsResponse {
        events: state.registry.summaries(),
    })
}

// ── Metrics ──────────────────────────────────────────────────────────────

pub async fn get_metrics(State(state): State<RpcState>) -> Result<Response, RpcError> {
    let registry = state.metrics.as_ref().ok_or(RpcError::MetricsDisabled)?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}
