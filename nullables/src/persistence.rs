//! Nullable tally persistence — an in-memory `TallyPersistence`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tally_store::{StoreError, TallyPersistence};
use tally_types::{ContestantId, ContestantTally};
use tally_utils::lock;

/// Keeps the last saved tallies in memory and enforces the same
/// never-lower rule as a durable backend.
#[derive(Default)]
pub struct NullTallyPersistence {
    saved: Mutex<BTreeMap<ContestantId, ContestantTally>>,
    saves: Mutex<u64>,
}

impl NullTallyPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate as if a previous run had saved `tallies`.
    pub fn with_tallies(tallies: Vec<ContestantTally>) -> Self {
        let saved = tallies.into_iter().map(|t| (t.id().clone(), t)).collect();
        Self {
            saved: Mutex::new(saved),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> u64 {
        *lock(&self.saves)
    }

    pub fn get(&self, contestant: &ContestantId) -> Option<ContestantTally> {
        lock(&self.saved).get(contestant).cloned()
    }
}

impl TallyPersistence for NullTallyPersistence {
    fn load(&self) -> Result<Vec<ContestantTally>, StoreError> {
        Ok(lock(&self.saved).values().cloned().collect())
    }

    fn save(&self, tallies: &[ContestantTally]) -> Result<(), StoreError> {
        let mut saved = lock(&self.saved);
        for tally in tallies {
            if let Some(previous) = saved.get(tally.id()) {
                if tally.free_votes < previous.free_votes || tally.paid_votes < previous.paid_votes {
                    return Err(StoreError::NonMonotonicRestore {
                        contestant: tally.id().clone(),
                        stored: previous.total(),
                        restoring: tally.total(),
                    });
                }
            }
        }
        *saved = tallies
            .iter()
            .map(|t| (t.id().clone(), t.clone()))
            .collect();
        *lock(&self.saves) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::ContestantProfile;

    fn tally(id: &str, free: u64) -> ContestantTally {
        let mut t = ContestantTally::new(ContestantProfile::new(id, "main"));
        t.free_votes = free;
        t
    }

    #[test]
    fn save_then_load() {
        let persistence = NullTallyPersistence::new();
        persistence.save(&[tally("a", 3), tally("b", 1)]).unwrap();
        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(persistence.get(&ContestantId::new("a")).unwrap().free_votes, 3);
        assert_eq!(persistence.save_count(), 1);
    }

    #[test]
    fn lowering_a_total_is_refused() {
        let persistence = NullTallyPersistence::with_tallies(vec![tally("a", 10)]);
        let err = persistence.save(&[tally("a", 9)]).unwrap_err();
        assert!(matches!(err, StoreError::NonMonotonicRestore { .. }));
        assert_eq!(persistence.get(&ContestantId::new("a")).unwrap().free_votes, 10);
    }
}
