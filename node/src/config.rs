//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_engine::EngineConfig;
use tally_types::{ContestantProfile, EventId};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a tally node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Publisher cadence in milliseconds.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Trend sampler cadence in seconds.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Lookback for `last_24h_change`.
    #[serde(default = "default_trend_window_secs")]
    pub trend_window_secs: u64,

    /// How long trend samples are kept.
    #[serde(default = "default_trend_retention_secs")]
    pub trend_retention_secs: u64,

    /// Deltas within this many votes of zero are reported as neutral.
    #[serde(default)]
    pub trend_epsilon: u64,

    /// Ranking budget per tick in milliseconds. Defaults to the update
    /// interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_budget_ms: Option<u64>,

    /// Idempotency keys remembered per contestant.
    #[serde(default = "default_idempotency_window")]
    pub idempotency_window: usize,

    /// Directory for per-event tally files. Persistence is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// How often tallies are written to `data_dir`.
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,

    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default)]
    pub enable_websocket: bool,

    #[serde(default = "default_ws_port")]
    pub websocket_port: u16,

    /// Serve Prometheus metrics at `/metrics` on the RPC port.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Events created at startup.
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

/// One event to create at startup, with its initial contestants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    pub id: EventId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contestants: Vec<ContestantProfile>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_update_interval_ms() -> u64 {
    5_000
}

fn default_sample_interval_secs() -> u64 {
    300
}

fn default_trend_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_trend_retention_secs() -> u64 {
    48 * 60 * 60
}

fn default_idempotency_window() -> usize {
    tally_store::DEFAULT_IDEMPOTENCY_WINDOW
}

fn default_persist_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7380
}

fn default_ws_port() -> u16 {
    7381
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings that would stall a timer or divide by zero.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.update_interval_ms == 0 {
            return Err(NodeError::Config("update_interval_ms must be positive".into()));
        }
        if self.sample_interval_secs == 0 {
            return Err(NodeError::Config("sample_interval_secs must be positive".into()));
        }
        if self.persist_interval_secs == 0 {
            return Err(NodeError::Config("persist_interval_secs must be positive".into()));
        }
        if self.trend_retention_secs < self.trend_window_secs {
            return Err(NodeError::Config(
                "trend_retention_secs must cover trend_window_secs".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for event in &self.events {
            if !seen.insert(&event.id) {
                return Err(NodeError::Config(format!("duplicate event id: {}", event.id)));
            }
        }
        self.log_format.parse::<LogFormat>()?;
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    /// Runtime subset handed to every event engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            update_interval: self.update_interval(),
            sample_interval: self.sample_interval(),
            trend_window: Duration::from_secs(self.trend_window_secs),
            trend_retention: Duration::from_secs(self.trend_retention_secs),
            trend_epsilon: self.trend_epsilon,
            tick_budget: Some(Duration::from_millis(
                self.tick_budget_ms.unwrap_or(self.update_interval_ms),
            )),
            idempotency_window: self.idempotency_window,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            sample_interval_secs: default_sample_interval_secs(),
            trend_window_secs: default_trend_window_secs(),
            trend_retention_secs: default_trend_retention_secs(),
            trend_epsilon: 0,
            tick_budget_ms: None,
            idempotency_window: default_idempotency_window(),
            data_dir: None,
            persist_interval_secs: default_persist_interval_secs(),
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            enable_websocket: false,
            websocket_port: default_ws_port(),
            enable_metrics: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
            events: Vec::new(),
        }
    }
}
