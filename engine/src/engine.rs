//! One voting event's tally pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use tally_ingest::{IngestGateway, IngestResponse, IngestStats, VoteSubmission};
use tally_publisher::{category_view, PublisherState, SnapshotPublisher, TickOutcome};
use tally_ranking::RankingCalculator;
use tally_store::{TallyPersistence, TallyStore};
use tally_trend::{Trend, TrendSample, TrendTracker};
use tally_types::{
    CategoryId, Clock, ContestantId, ContestantProfile, ContestantTally, EventId, EventStatus,
    LeaderboardSnapshot,
};

use crate::{EngineConfig, EngineError};

/// Listing row for `GET /events`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub event_id: EventId,
    pub name: String,
    pub status: EventStatus,
    pub paused: bool,
    pub contestants: usize,
    pub version: u64,
    pub total_votes: u64,
}

pub struct EventEngine {
    event_id: EventId,
    name: String,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    store: Arc<TallyStore>,
    trend: Arc<TrendTracker>,
    publisher: SnapshotPublisher,
    gateway: IngestGateway,
}

impl EventEngine {
    pub fn new(
        event_id: EventId,
        name: impl Into<String>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(TallyStore::new(config.idempotency_window));
        let trend = Arc::new(TrendTracker::new(
            config.trend_retention,
            config.sample_interval,
        ));
        let publisher = SnapshotPublisher::new(
            event_id.clone(),
            Arc::clone(&store),
            Arc::clone(&trend),
            RankingCalculator::new(config.ranking_params()),
            config.tick_budget,
            clock.now(),
        );
        let gateway =
            IngestGateway::new(event_id.clone(), Arc::clone(&store), Arc::clone(&clock));
        Self {
            event_id,
            name: name.into(),
            config,
            clock,
            store,
            trend,
            publisher,
            gateway,
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Contestants ────────────────────────────────────────────────────

    pub fn register_contestant(&self, profile: ContestantProfile) -> Result<(), EngineError> {
        let id = profile.id.clone();
        self.store.register(profile)?;
        tracing::info!(event = %self.event_id, contestant = %id, "contestant registered");
        Ok(())
    }

    /// Remove a contestant and its trend history. It disappears from the
    /// leaderboard at the next tick.
    pub fn archive_contestant(&self, contestant: &ContestantId) -> Result<ContestantTally, EngineError> {
        let tally = self.store.archive(contestant)?;
        self.trend.forget(contestant);
        Ok(tally)
    }

    pub fn contestant_count(&self) -> usize {
        self.store.len()
    }

    // ── Ingest and control ─────────────────────────────────────────────

    pub fn submit(&self, submission: &VoteSubmission) -> IngestResponse {
        self.gateway.submit(submission)
    }

    pub fn pause_ingest(&self) {
        self.gateway.pause();
    }

    pub fn resume_ingest(&self) {
        self.gateway.resume();
    }

    pub fn close(&self) {
        self.gateway.close();
    }

    pub fn is_paused(&self) -> bool {
        self.gateway.is_paused()
    }

    pub fn status(&self) -> EventStatus {
        self.gateway.status()
    }

    pub fn ingest_stats(&self) -> IngestStats {
        self.gateway.stats()
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    /// The current snapshot, or a category-scoped view of it.
    pub fn leaderboard(&self, category: Option<&CategoryId>) -> Arc<LeaderboardSnapshot> {
        let current = self.publisher.current();
        match category {
            Some(category) => Arc::new(category_view(&current, category)),
            None => current,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<LeaderboardSnapshot>> {
        self.publisher.subscribe()
    }

    /// Vote change of one contestant over `window`, measured against its
    /// live total.
    pub fn trend(&self, contestant: &ContestantId, window: Duration) -> Result<Trend, EngineError> {
        let tally = self
            .store
            .get(contestant)
            .ok_or_else(|| EngineError::ContestantNotFound(contestant.clone()))?;
        Ok(self.trend.trend(
            contestant,
            window,
            self.config.trend_epsilon,
            self.clock.now(),
            tally.total(),
        ))
    }

    pub fn trend_samples(&self, contestant: &ContestantId) -> Vec<TrendSample> {
        self.trend.samples(contestant)
    }

    /// Run one publisher cycle at the current time.
    pub fn tick(&self) -> TickOutcome {
        self.publisher.tick(self.clock.now())
    }

    /// Record a trend sample for every contestant at the current time.
    pub fn sample(&self) -> usize {
        self.trend.sample(&self.store, self.clock.now())
    }

    pub fn publisher_state(&self) -> PublisherState {
        self.publisher.state()
    }

    pub fn published_count(&self) -> u64 {
        self.publisher.published_count()
    }

    pub fn skipped_count(&self) -> u64 {
        self.publisher.skipped_count()
    }

    pub fn summary(&self) -> EventSummary {
        let current = self.publisher.current();
        EventSummary {
            event_id: self.event_id.clone(),
            name: self.name.clone(),
            status: self.status(),
            paused: self.is_paused(),
            contestants: self.contestant_count(),
            version: current.version,
            total_votes: current.total_votes,
        }
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Reload tallies from `persistence`. Never lowers a total.
    ///
    /// Only counters come back; the idempotency windows start empty, so a
    /// client retrying across the restart is counted again.
    pub fn restore_from(&self, persistence: &dyn TallyPersistence) -> Result<usize, EngineError> {
        let records = persistence.load()?;
        let restored = self.store.restore(records)?;
        tracing::info!(event = %self.event_id, restored, "tallies restored");
        Ok(restored)
    }

    pub fn persist_to(&self, persistence: &dyn TallyPersistence) -> Result<usize, EngineError> {
        let view = self.store.read_view(self.clock.now());
        persistence.save(&view.tallies)?;
        tracing::debug!(event = %self.event_id, contestants = view.len(), "tallies persisted");
        Ok(view.len())
    }
}
