//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use tally_engine::EngineError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("contestant not found: {0}")]
    ContestantNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EventNotFound(_) | Self::ContestantNotFound(_) | Self::MetricsDisabled => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for RpcError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::EventNotFound(id) => Self::EventNotFound(id.to_string()),
            EngineError::ContestantNotFound(id) => Self::ContestantNotFound(id.to_string()),
            EngineError::EventExists(id) => Self::Conflict(format!("event exists: {id}")),
            EngineError::Store(err) => Self::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
