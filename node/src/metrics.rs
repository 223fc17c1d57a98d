//! Prometheus metrics for the tally node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] that the RPC
//! `/metrics` endpoint encodes into the Prometheus text exposition format.
//! Ingest counters live on each event's gateway; [`NodeMetrics::refresh`]
//! folds their growth into the process-wide counters.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

use tally_engine::EngineRegistry;
use tally_ingest::IngestStats;
use tally_publisher::TickOutcome;
use tally_types::EventId;
use tally_utils::lock;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub votes_accepted: IntCounter,
    pub votes_rejected: IntCounter,
    pub votes_duplicate: IntCounter,
    pub snapshots_published: IntCounter,
    pub ticks_skipped: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub event_count: IntGauge,
    pub contestant_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one publisher tick, published or not.
    pub tick_duration_ms: Histogram,

    /// Last ingest stats seen per event, so counters only ever advance.
    seen: Mutex<HashMap<EventId, IngestStats>>,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let votes_accepted = register_int_counter_with_registry!(
            Opts::new("tally_votes_accepted_total", "Vote increments applied"),
            registry
        )
        .expect("failed to register votes_accepted counter");

        let votes_rejected = register_int_counter_with_registry!(
            Opts::new("tally_votes_rejected_total", "Vote increments rejected"),
            registry
        )
        .expect("failed to register votes_rejected counter");

        let votes_duplicate = register_int_counter_with_registry!(
            Opts::new(
                "tally_votes_duplicate_total",
                "Replayed increments recognised by idempotency key"
            ),
            registry
        )
        .expect("failed to register votes_duplicate counter");

        let snapshots_published = register_int_counter_with_registry!(
            Opts::new(
                "tally_snapshots_published_total",
                "Leaderboard snapshots published across all events"
            ),
            registry
        )
        .expect("failed to register snapshots_published counter");

        let ticks_skipped = register_int_counter_with_registry!(
            Opts::new(
                "tally_ticks_skipped_total",
                "Publisher ticks that did not publish"
            ),
            registry
        )
        .expect("failed to register ticks_skipped counter");

        let event_count = register_int_gauge_with_registry!(
            Opts::new("tally_event_count", "Events hosted by this node"),
            registry
        )
        .expect("failed to register event_count gauge");

        let contestant_count = register_int_gauge_with_registry!(
            Opts::new("tally_contestant_count", "Active contestants across all events"),
            registry
        )
        .expect("failed to register contestant_count gauge");

        // 0.1 ms → ~1.6 s
        let tick_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new("tally_tick_duration_ms", "Publisher tick time in milliseconds")
                .buckets(prometheus::exponential_buckets(0.1, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register tick_duration_ms histogram");

        Self {
            registry,
            votes_accepted,
            votes_rejected,
            votes_duplicate,
            snapshots_published,
            ticks_skipped,
            event_count,
            contestant_count,
            tick_duration_ms,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe_tick(&self, elapsed: Duration, outcome: &TickOutcome) {
        self.tick_duration_ms.observe(elapsed.as_secs_f64() * 1000.0);
        match outcome {
            TickOutcome::Published { .. } => self.snapshots_published.inc(),
            TickOutcome::Skipped(_) => self.ticks_skipped.inc(),
        }
    }

    /// Update gauges and advance the vote counters by whatever each event's
    /// gateway has counted since the previous refresh.
    pub fn refresh(&self, registry: &EngineRegistry) {
        let engines = registry.engines();
        self.event_count.set(engines.len() as i64);
        self.contestant_count
            .set(engines.iter().map(|e| e.contestant_count() as i64).sum());

        let mut seen = lock(&self.seen);
        seen.retain(|id, _| engines.iter().any(|e| e.event_id() == id));
        for engine in &engines {
            let now = engine.ingest_stats();
            let before = seen.insert(engine.event_id().clone(), now).unwrap_or_default();
            self.votes_accepted
                .inc_by(now.accepted.saturating_sub(before.accepted));
            self.votes_rejected
                .inc_by(now.rejected.saturating_sub(before.rejected));
            self.votes_duplicate
                .inc_by(now.duplicate.saturating_sub(before.duplicate));
        }
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
