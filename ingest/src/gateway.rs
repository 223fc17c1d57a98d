//! Validation and control in front of the tally store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use tally_store::{StoreError, TallyStore};
use tally_types::{Clock, EventId, EventStatus, RejectReason};
use tally_utils::{read, write, StatsCounter};

use crate::submission::{IngestResponse, VoteSubmission};

const ACCEPTED: &str = "accepted";
const REJECTED: &str = "rejected";
const DUPLICATE: &str = "duplicate";

/// Per-event submission counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
    pub duplicate: u64,
}

/// Accepts or rejects vote increments for one event.
///
/// Pausing is orthogonal to the event status: a paused live event rejects
/// with `VotingPaused`, a closed event always rejects with `EventClosed`.
/// Neither affects what readers of the store or the published snapshots see.
///
/// Increments are stamped with the gateway clock when applied; the caller's
/// `occurred_at` never feeds the earliest-vote tie-break.
pub struct IngestGateway {
    event_id: EventId,
    store: Arc<TallyStore>,
    clock: Arc<dyn Clock>,
    paused: AtomicBool,
    status: RwLock<EventStatus>,
    stats: StatsCounter,
}

impl IngestGateway {
    pub fn new(event_id: EventId, store: Arc<TallyStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            event_id,
            store,
            clock,
            paused: AtomicBool::new(false),
            status: RwLock::new(EventStatus::Live),
            stats: StatsCounter::new(&[ACCEPTED, REJECTED, DUPLICATE]),
        }
    }

    pub fn submit(&self, submission: &VoteSubmission) -> IngestResponse {
        let response = self.evaluate(submission);
        match response.reason {
            None => self.stats.increment(ACCEPTED),
            Some(RejectReason::Duplicate) => self.stats.increment(DUPLICATE),
            Some(reason) => {
                self.stats.increment(REJECTED);
                tracing::debug!(
                    event = %self.event_id,
                    contestant = %submission.contestant_id,
                    key = %submission.idempotency_key,
                    reason = %reason,
                    "vote increment rejected"
                );
            }
        }
        response
    }

    fn evaluate(&self, submission: &VoteSubmission) -> IngestResponse {
        if !self.status().accepts_votes() {
            return IngestResponse::rejected(RejectReason::EventClosed);
        }
        if self.is_paused() {
            return IngestResponse::rejected(RejectReason::VotingPaused);
        }
        if submission.amount <= 0 {
            return IngestResponse::rejected(RejectReason::InvalidAmount);
        }
        match self
            .store
            .in_category(&submission.contestant_id, &submission.category_id)
        {
            Some(true) => {}
            Some(false) | None => {
                return IngestResponse::rejected(RejectReason::UnknownContestant)
            }
        }

        match self.store.apply_increment(
            &submission.contestant_id,
            submission.vote_kind,
            submission.amount,
            &submission.idempotency_key,
            self.clock.now(),
        ) {
            Ok(outcome) if outcome.is_duplicate() => IngestResponse::duplicate(),
            Ok(_) => IngestResponse::accepted(),
            // Archived between the category check and the increment.
            Err(StoreError::UnknownContestant(_)) => {
                IngestResponse::rejected(RejectReason::UnknownContestant)
            }
            Err(StoreError::InvalidAmount(_)) => {
                IngestResponse::rejected(RejectReason::InvalidAmount)
            }
            Err(err) => {
                tracing::warn!(event = %self.event_id, error = %err, "unexpected store error on ingest");
                IngestResponse::rejected(RejectReason::UnknownContestant)
            }
        }
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            tracing::info!(event = %self.event_id, "ingest paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            tracing::info!(event = %self.event_id, "ingest resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Stop accepting increments for good.
    pub fn close(&self) {
        let mut status = write(&self.status);
        if *status != EventStatus::Closed {
            *status = EventStatus::Closed;
            tracing::info!(event = %self.event_id, "event closed");
        }
    }

    pub fn status(&self) -> EventStatus {
        *read(&self.status)
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.stats.get(ACCEPTED),
            rejected: self.stats.get(REJECTED),
            duplicate: self.stats.get(DUPLICATE),
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }
}
