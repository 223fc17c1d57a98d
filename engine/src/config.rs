//! Runtime tunables shared by every engine in a registry.

use std::time::Duration;

use tally_ranking::RankingParams;
use tally_store::DEFAULT_IDEMPOTENCY_WINDOW;
use tally_trend::{DEFAULT_RETENTION, DEFAULT_SAMPLE_INTERVAL, DEFAULT_WINDOW};

/// Default publisher cadence.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often the publisher ticks.
    pub update_interval: Duration,
    /// How often the trend sampler records totals.
    pub sample_interval: Duration,
    pub trend_window: Duration,
    pub trend_retention: Duration,
    pub trend_epsilon: u64,
    /// Ranking passes slower than this are discarded. `None` disables the
    /// check.
    pub tick_budget: Option<Duration>,
    /// Idempotency keys remembered per contestant.
    pub idempotency_window: usize,
}

impl EngineConfig {
    pub fn ranking_params(&self) -> RankingParams {
        RankingParams {
            trend_window: self.trend_window,
            trend_epsilon: self.trend_epsilon,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            trend_window: DEFAULT_WINDOW,
            trend_retention: DEFAULT_RETENTION,
            trend_epsilon: 0,
            tick_budget: Some(DEFAULT_UPDATE_INTERVAL),
            idempotency_window: DEFAULT_IDEMPOTENCY_WINDOW,
        }
    }
}
