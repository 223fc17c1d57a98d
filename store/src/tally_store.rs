//! Per-contestant counters with at-most-once increments.
//!
//! The contestant map is behind an `RwLock` that writers of *votes* only ever
//! take for reading: an increment clones the contestant's slot handle, drops
//! the map lock, and then serialises only against other increments for the
//! same contestant. The map's write lock is taken for registration and
//! archival, which are rare.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tally_types::{
    CategoryId, ContestantId, ContestantProfile, ContestantTally, IdempotencyKey, Timestamp, VoteKind,
};
use tally_utils::{lock, read, write};

use crate::dedup::{IdempotencyWindow, DEFAULT_IDEMPOTENCY_WINDOW};
use crate::view::TallyView;
use crate::StoreError;

/// Result of a successful [`TallyStore::apply_increment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The increment was applied; `total` is the contestant's new total.
    Applied { total: u64 },
    /// The idempotency key was already applied; nothing changed.
    Duplicate { total: u64 },
}

impl ApplyOutcome {
    pub fn total(&self) -> u64 {
        match self {
            Self::Applied { total } | Self::Duplicate { total } => *total,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

struct Slot {
    profile: ContestantProfile,
    /// Registration sequence number; views list contestants in this order.
    order: u64,
    state: Mutex<SlotState>,
}

struct SlotState {
    free: u64,
    paid: u64,
    first_vote_at: Option<Timestamp>,
    applied: IdempotencyWindow,
    /// Set by `archive` under this lock; increments that raced the removal
    /// from the map see it and are rejected.
    archived: bool,
}

impl Slot {
    fn snapshot(&self) -> ContestantTally {
        let state = lock(&self.state);
        ContestantTally {
            profile: self.profile.clone(),
            free_votes: state.free,
            paid_votes: state.paid,
            first_vote_at: state.first_vote_at,
        }
    }
}

/// Authoritative vote counters for one event.
pub struct TallyStore {
    slots: RwLock<HashMap<ContestantId, Arc<Slot>>>,
    next_order: AtomicU64,
    idempotency_window: usize,
}

impl TallyStore {
    /// Create an empty store whose contestants each remember the last
    /// `idempotency_window` keys.
    pub fn new(idempotency_window: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_order: AtomicU64::new(0),
            idempotency_window,
        }
    }

    /// Register a contestant with zeroed counters.
    pub fn register(&self, profile: ContestantProfile) -> Result<(), StoreError> {
        let mut slots = write(&self.slots);
        if slots.contains_key(&profile.id) {
            return Err(StoreError::ContestantExists(profile.id));
        }
        let slot = self.new_slot(profile);
        slots.insert(slot.profile.id.clone(), Arc::new(slot));
        Ok(())
    }

    /// Remove a contestant, returning its final counters.
    pub fn archive(&self, contestant: &ContestantId) -> Result<ContestantTally, StoreError> {
        let slot = write(&self.slots)
            .remove(contestant)
            .ok_or_else(|| StoreError::UnknownContestant(contestant.clone()))?;
        let tally = {
            let mut state = lock(&slot.state);
            state.archived = true;
            ContestantTally {
                profile: slot.profile.clone(),
                free_votes: state.free,
                paid_votes: state.paid,
                first_vote_at: state.first_vote_at,
            }
        };
        tracing::info!(contestant = %contestant, "contestant archived");
        Ok(tally)
    }

    /// Apply `amount` votes of `kind` to one contestant at most once per
    /// `key`. `recorded_at` is when the engine recorded the increment and
    /// feeds the earliest-vote tie-break.
    ///
    /// Rejections are ordinary errors; nothing is partially applied.
    pub fn apply_increment(
        &self,
        contestant: &ContestantId,
        kind: VoteKind,
        amount: i64,
        key: &IdempotencyKey,
        recorded_at: Timestamp,
    ) -> Result<ApplyOutcome, StoreError> {
        if amount <= 0 {
            tracing::debug!(contestant = %contestant, amount, "rejected non-positive increment");
            return Err(StoreError::InvalidAmount(amount));
        }
        let amount = amount.unsigned_abs();

        let slot = self.slot(contestant).ok_or_else(|| {
            tracing::debug!(contestant = %contestant, "rejected increment for unknown contestant");
            StoreError::UnknownContestant(contestant.clone())
        })?;

        let mut state = lock(&slot.state);
        if state.archived {
            tracing::debug!(contestant = %contestant, "rejected increment for archived contestant");
            return Err(StoreError::UnknownContestant(contestant.clone()));
        }
        if !state.applied.insert(key) {
            return Ok(ApplyOutcome::Duplicate {
                total: state.free.saturating_add(state.paid),
            });
        }
        match kind {
            VoteKind::Free => state.free = state.free.saturating_add(amount),
            VoteKind::Paid => state.paid = state.paid.saturating_add(amount),
        }
        state.first_vote_at = Some(match state.first_vote_at {
            Some(first) => first.min(recorded_at),
            None => recorded_at,
        });
        Ok(ApplyOutcome::Applied {
            total: state.free.saturating_add(state.paid),
        })
    }

    /// Copy every contestant's counters.
    ///
    /// The map lock is held only long enough to clone slot handles; each row
    /// is then copied under its own lock.
    pub fn read_view(&self, now: Timestamp) -> TallyView {
        let mut slots: Vec<Arc<Slot>> = read(&self.slots).values().cloned().collect();
        slots.sort_by_key(|slot| slot.order);
        TallyView::new(now, slots.iter().map(|slot| slot.snapshot()).collect())
    }

    /// Current counters of one contestant.
    pub fn get(&self, contestant: &ContestantId) -> Option<ContestantTally> {
        self.slot(contestant).map(|slot| slot.snapshot())
    }

    pub fn profile(&self, contestant: &ContestantId) -> Option<ContestantProfile> {
        self.slot(contestant).map(|slot| slot.profile.clone())
    }

    pub fn contains(&self, contestant: &ContestantId) -> bool {
        read(&self.slots).contains_key(contestant)
    }

    /// Whether `contestant` is registered under `category`; `None` if the
    /// contestant is unknown.
    pub fn in_category(&self, contestant: &ContestantId, category: &CategoryId) -> Option<bool> {
        read(&self.slots)
            .get(contestant)
            .map(|slot| &slot.profile.category == category)
    }

    pub fn len(&self) -> usize {
        read(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.slots).is_empty()
    }

    /// Reload persisted tallies.
    ///
    /// Every record is checked before any is applied: a record whose free or
    /// paid count is below the in-memory value fails the whole restore.
    /// Unknown contestants are registered. Returns the number of records
    /// applied.
    pub fn restore(&self, records: Vec<ContestantTally>) -> Result<usize, StoreError> {
        for record in &records {
            if let Some(current) = self.get(record.id()) {
                check_not_lower(record.id(), current.free_votes, record.free_votes)?;
                check_not_lower(record.id(), current.paid_votes, record.paid_votes)?;
            }
        }

        let count = records.len();
        for record in records {
            let slot = {
                let mut slots = write(&self.slots);
                match slots.get(record.id()) {
                    Some(slot) => Arc::clone(slot),
                    None => {
                        let slot = Arc::new(self.new_slot(record.profile.clone()));
                        slots.insert(record.id().clone(), Arc::clone(&slot));
                        slot
                    }
                }
            };
            let mut state = lock(&slot.state);
            // Increments may have landed since the check; never go below them.
            state.free = state.free.max(record.free_votes);
            state.paid = state.paid.max(record.paid_votes);
            state.first_vote_at = match (state.first_vote_at, record.first_vote_at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        tracing::info!(records = count, "tallies restored");
        Ok(count)
    }

    fn slot(&self, contestant: &ContestantId) -> Option<Arc<Slot>> {
        read(&self.slots).get(contestant).cloned()
    }

    fn new_slot(&self, profile: ContestantProfile) -> Slot {
        Slot {
            profile,
            order: self.next_order.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(SlotState {
                free: 0,
                paid: 0,
                first_vote_at: None,
                applied: IdempotencyWindow::new(self.idempotency_window),
                archived: false,
            }),
        }
    }
}

fn check_not_lower(contestant: &ContestantId, stored: u64, restoring: u64) -> Result<(), StoreError> {
    if restoring < stored {
        return Err(StoreError::NonMonotonicRestore {
            contestant: contestant.clone(),
            stored,
            restoring,
        });
    }
    Ok(())
}

impl Default for TallyStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ContestantId {
        ContestantId::new(s)
    }

    fn key(s: &str) -> IdempotencyKey {
        IdempotencyKey::new(s)
    }

    fn store_with(ids: &[&str]) -> TallyStore {
        let store = TallyStore::default();
        for name in ids {
            store
                .register(ContestantProfile::new(*name, "main"))
                .unwrap();
        }
        store
    }

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn register_twice_is_rejected() {
        let store = store_with(&["a"]);
        let err = store
            .register(ContestantProfile::new("a", "main"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ContestantExists(_)));
    }

    #[test]
    fn category_membership() {
        let store = store_with(&["a"]);
        assert_eq!(store.in_category(&id("a"), &CategoryId::new("main")), Some(true));
        assert_eq!(store.in_category(&id("a"), &CategoryId::new("other")), Some(false));
        assert_eq!(store.in_category(&id("zz"), &CategoryId::new("main")), None);
    }

    #[test]
    fn free_and_paid_are_counted_separately() {
        let store = store_with(&["a"]);
        store
            .apply_increment(&id("a"), VoteKind::Free, 3, &key("1"), at(1))
            .unwrap();
        let outcome = store
            .apply_increment(&id("a"), VoteKind::Paid, 5, &key("2"), at(2))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { total: 8 });

        let tally = store.get(&id("a")).unwrap();
        assert_eq!(tally.free_votes, 3);
        assert_eq!(tally.paid_votes, 5);
        assert_eq!(tally.total(), 8);
    }

    #[test]
    fn duplicate_key_applies_once() {
        let store = store_with(&["d"]);
        let first = store
            .apply_increment(&id("d"), VoteKind::Free, 10, &key("k1"), at(1))
            .unwrap();
        let second = store
            .apply_increment(&id("d"), VoteKind::Free, 10, &key("k1"), at(1))
            .unwrap();
        assert_eq!(first, ApplyOutcome::Applied { total: 10 });
        assert_eq!(second, ApplyOutcome::Duplicate { total: 10 });
        assert_eq!(store.get(&id("d")).unwrap().total(), 10);
    }

    #[test]
    fn same_key_on_different_contestants_is_independent() {
        let store = store_with(&["a", "b"]);
        store
            .apply_increment(&id("a"), VoteKind::Free, 1, &key("shared"), at(1))
            .unwrap();
        let outcome = store
            .apply_increment(&id("b"), VoteKind::Free, 1, &key("shared"), at(1))
            .unwrap();
        assert!(!outcome.is_duplicate());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let store = store_with(&["a"]);
        for amount in [0, -5] {
            let err = store
                .apply_increment(&id("a"), VoteKind::Free, amount, &key("x"), at(1))
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidAmount(a) if a == amount));
        }
        // A rejected call must not burn the idempotency key.
        let outcome = store
            .apply_increment(&id("a"), VoteKind::Free, 1, &key("x"), at(1))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { total: 1 });
    }

    #[test]
    fn unknown_contestant_is_rejected() {
        let store = store_with(&["a"]);
        let err = store
            .apply_increment(&id("ghost"), VoteKind::Paid, 1, &key("x"), at(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownContestant(ref c) if c.as_str() == "ghost"));
    }

    #[test]
    fn increments_touch_only_their_contestant() {
        let store = store_with(&["a", "b"]);
        store
            .apply_increment(&id("a"), VoteKind::Free, 7, &key("1"), at(1))
            .unwrap();
        assert_eq!(store.get(&id("b")).unwrap().total(), 0);
    }

    #[test]
    fn first_vote_is_the_earliest_occurrence() {
        let store = store_with(&["a"]);
        store
            .apply_increment(&id("a"), VoteKind::Free, 1, &key("1"), at(50))
            .unwrap();
        store
            .apply_increment(&id("a"), VoteKind::Free, 1, &key("2"), at(20))
            .unwrap();
        store
            .apply_increment(&id("a"), VoteKind::Free, 1, &key("3"), at(90))
            .unwrap();
        assert_eq!(store.get(&id("a")).unwrap().first_vote_at, Some(at(20)));
    }

    #[test]
    fn view_lists_contestants_in_registration_order() {
        let store = store_with(&["zeta", "alpha", "mid"]);
        let view = store.read_view(at(1));
        let ids: Vec<_> = view.tallies.iter().map(|t| t.id().as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(view.taken_at, at(1));
    }

    #[test]
    fn view_is_a_copy() {
        let store = store_with(&["a"]);
        let view = store.read_view(at(1));
        store
            .apply_increment(&id("a"), VoteKind::Free, 4, &key("1"), at(2))
            .unwrap();
        assert_eq!(view.total_votes(), 0);
        assert_eq!(store.read_view(at(3)).total_votes(), 4);
    }

    #[test]
    fn archive_removes_contestant() {
        let store = store_with(&["a", "b"]);
        store
            .apply_increment(&id("a"), VoteKind::Paid, 2, &key("1"), at(1))
            .unwrap();
        let final_tally = store.archive(&id("a")).unwrap();
        assert_eq!(final_tally.total(), 2);
        assert!(!store.contains(&id("a")));
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.archive(&id("a")),
            Err(StoreError::UnknownContestant(_))
        ));
    }

    #[test]
    fn restore_registers_and_raises() {
        let store = store_with(&["a"]);
        let mut a = ContestantTally::new(ContestantProfile::new("a", "main"));
        a.free_votes = 10;
        a.paid_votes = 2;
        let mut b = ContestantTally::new(ContestantProfile::new("b", "main"));
        b.free_votes = 4;
        b.first_vote_at = Some(at(7));

        assert_eq!(store.restore(vec![a, b]).unwrap(), 2);
        assert_eq!(store.get(&id("a")).unwrap().total(), 12);
        let b = store.get(&id("b")).unwrap();
        assert_eq!(b.total(), 4);
        assert_eq!(b.first_vote_at, Some(at(7)));
    }

    #[test]
    fn restore_never_lowers_a_total() {
        let store = store_with(&["a", "b"]);
        store
            .apply_increment(&id("a"), VoteKind::Free, 10, &key("1"), at(1))
            .unwrap();

        let mut b = ContestantTally::new(ContestantProfile::new("b", "main"));
        b.free_votes = 99;
        let mut stale_a = ContestantTally::new(ContestantProfile::new("a", "main"));
        stale_a.free_votes = 3;

        let err = store.restore(vec![b, stale_a]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NonMonotonicRestore { stored: 10, restoring: 3, .. }
        ));
        // Nothing from the failed restore was applied.
        assert_eq!(store.get(&id("b")).unwrap().total(), 0);
        assert_eq!(store.get(&id("a")).unwrap().total(), 10);
    }
}
