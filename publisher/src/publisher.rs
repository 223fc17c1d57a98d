//! Tick cycle: `Idle → Ticking → Published → Idle`.
//!
//! One tick reads the tally store once, ranks it, and swaps the result in as
//! the current snapshot. Ticks never overlap: a tick that finds another one
//! in flight is skipped, and a tick whose ranking pass overruns its budget is
//! discarded so the previous snapshot stays current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

use tally_ranking::RankingCalculator;
use tally_store::TallyStore;
use tally_trend::TrendTracker;
use tally_types::{EventId, LeaderboardSnapshot, Timestamp};
use tally_utils::lock;

/// Where the publisher is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherState {
    Idle,
    Ticking,
    Published,
}

/// Why a tick did not publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Another tick was still running.
    InProgress,
    /// Ranking took longer than the tick budget.
    OverBudget { elapsed: Duration },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Published { version: u64 },
    Skipped(SkipReason),
}

pub struct SnapshotPublisher {
    event_id: EventId,
    store: Arc<TallyStore>,
    trend: Arc<TrendTracker>,
    calculator: Mutex<RankingCalculator>,
    current: watch::Sender<Arc<LeaderboardSnapshot>>,
    state: Mutex<PublisherState>,
    /// Maximum time a ranking pass may take before its result is discarded.
    budget: Option<Duration>,
    published: AtomicU64,
    skipped: AtomicU64,
}

impl SnapshotPublisher {
    /// Create a publisher whose current snapshot is the empty version 0.
    pub fn new(
        event_id: EventId,
        store: Arc<TallyStore>,
        trend: Arc<TrendTracker>,
        calculator: RankingCalculator,
        budget: Option<Duration>,
        now: Timestamp,
    ) -> Self {
        let initial = Arc::new(LeaderboardSnapshot::empty(event_id.clone(), now));
        let (current, _) = watch::channel(initial);
        Self {
            event_id,
            store,
            trend,
            calculator: Mutex::new(calculator),
            current,
            state: Mutex::new(PublisherState::Idle),
            budget,
            published: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Run one publication cycle stamped with `now`.
    pub fn tick(&self, now: Timestamp) -> TickOutcome {
        let mut calculator = match self.calculator.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event = %self.event_id, "tick skipped: previous tick still running");
                return TickOutcome::Skipped(SkipReason::InProgress);
            }
        };
        self.set_state(PublisherState::Ticking);

        let started = Instant::now();
        let view = self.store.read_view(now);
        let ranking = calculator.compute(&view, &self.trend);
        let elapsed = started.elapsed();

        if let Some(budget) = self.budget {
            if elapsed > budget {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                self.set_state(PublisherState::Idle);
                tracing::warn!(
                    event = %self.event_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = budget.as_millis() as u64,
                    "tick skipped: ranking exceeded budget"
                );
                return TickOutcome::Skipped(SkipReason::OverBudget { elapsed });
            }
        }

        let version = self.current.borrow().version + 1;
        let snapshot = Arc::new(LeaderboardSnapshot::new(
            self.event_id.clone(),
            version,
            now,
            ranking.total_votes,
            ranking.entries,
        ));
        self.current.send_replace(Arc::clone(&snapshot));
        calculator.remember(snapshot);
        self.published.fetch_add(1, Ordering::Relaxed);
        self.set_state(PublisherState::Published);

        tracing::debug!(
            event = %self.event_id,
            version,
            contestants = view.len(),
            total_votes = ranking.total_votes,
            elapsed_ms = elapsed.as_millis() as u64,
            "snapshot published"
        );
        self.set_state(PublisherState::Idle);
        TickOutcome::Published { version }
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<LeaderboardSnapshot> {
        Arc::clone(&self.current.borrow())
    }

    /// Stream of snapshots. A receiver that falls behind sees only the
    /// newest snapshot when it next polls.
    pub fn subscribe(&self) -> watch::Receiver<Arc<LeaderboardSnapshot>> {
        self.current.subscribe()
    }

    pub fn state(&self) -> PublisherState {
        *lock(&self.state)
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    fn set_state(&self, state: PublisherState) {
        *lock(&self.state) = state;
    }
}
