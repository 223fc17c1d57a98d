//! Storage trait for tally persistence across restarts.

use tally_types::ContestantTally;

use crate::StoreError;

/// Durable home for tallies.
///
/// Implementations must treat totals as append-only: a `save` that would lower
/// a previously saved contestant's free or paid count must fail with
/// [`StoreError::NonMonotonicRestore`] rather than overwrite it.
///
/// Only counters and profiles are saved. Idempotency windows are not, so
/// after a restore a key seen before the restart is accepted again.
pub trait TallyPersistence: Send + Sync {
    fn load(&self) -> Result<Vec<ContestantTally>, StoreError>;

    fn save(&self, tallies: &[ContestantTally]) -> Result<(), StoreError>;
}
