//! Event id → engine map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tally_ingest::{IngestResponse, VoteSubmission};
use tally_trend::Trend;
use tally_types::{CategoryId, Clock, ContestantId, EventId, LeaderboardSnapshot};
use tally_utils::{read, write};

use crate::{EngineConfig, EngineError, EventEngine, EventSummary};

/// Every live event engine, addressed by event id.
///
/// Engines are fully independent; the registry lock is only held to look one
/// up or to add/remove one, never across an engine operation.
pub struct EngineRegistry {
    engines: RwLock<HashMap<EventId, Arc<EventEngine>>>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl EngineRegistry {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_event(
        &self,
        event_id: EventId,
        name: impl Into<String>,
    ) -> Result<Arc<EventEngine>, EngineError> {
        let mut engines = write(&self.engines);
        if engines.contains_key(&event_id) {
            return Err(EngineError::EventExists(event_id));
        }
        let engine = Arc::new(EventEngine::new(
            event_id.clone(),
            name,
            self.config.clone(),
            Arc::clone(&self.clock),
        ));
        engines.insert(event_id.clone(), Arc::clone(&engine));
        tracing::info!(event = %event_id, "event created");
        Ok(engine)
    }

    pub fn remove_event(&self, event_id: &EventId) -> Result<Arc<EventEngine>, EngineError> {
        let engine = write(&self.engines)
            .remove(event_id)
            .ok_or_else(|| EngineError::EventNotFound(event_id.clone()))?;
        tracing::info!(event = %event_id, "event removed");
        Ok(engine)
    }

    pub fn get(&self, event_id: &EventId) -> Result<Arc<EventEngine>, EngineError> {
        read(&self.engines)
            .get(event_id)
            .cloned()
            .ok_or_else(|| EngineError::EventNotFound(event_id.clone()))
    }

    /// Event ids in lexical order.
    pub fn event_ids(&self) -> Vec<EventId> {
        let mut ids: Vec<EventId> = read(&self.engines).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All engines, ordered by event id.
    pub fn engines(&self) -> Vec<Arc<EventEngine>> {
        let mut engines: Vec<Arc<EventEngine>> = read(&self.engines).values().cloned().collect();
        engines.sort_by(|a, b| a.event_id().cmp(b.event_id()));
        engines
    }

    pub fn summaries(&self) -> Vec<EventSummary> {
        self.engines().iter().map(|engine| engine.summary()).collect()
    }

    pub fn len(&self) -> usize {
        read(&self.engines).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.engines).is_empty()
    }

    // ── Event-addressed operations ─────────────────────────────────────

    pub fn submit(
        &self,
        event_id: &EventId,
        submission: &VoteSubmission,
    ) -> Result<IngestResponse, EngineError> {
        Ok(self.get(event_id)?.submit(submission))
    }

    pub fn leaderboard(
        &self,
        event_id: &EventId,
        category: Option<&CategoryId>,
    ) -> Result<Arc<LeaderboardSnapshot>, EngineError> {
        Ok(self.get(event_id)?.leaderboard(category))
    }

    pub fn trend(
        &self,
        event_id: &EventId,
        contestant: &ContestantId,
        window: Duration,
    ) -> Result<Trend, EngineError> {
        self.get(event_id)?.trend(contestant, window)
    }

    pub fn pause_ingest(&self, event_id: &EventId) -> Result<(), EngineError> {
        self.get(event_id)?.pause_ingest();
        Ok(())
    }

    pub fn resume_ingest(&self, event_id: &EventId) -> Result<(), EngineError> {
        self.get(event_id)?.resume_ingest();
        Ok(())
    }
}
