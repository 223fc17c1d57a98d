//! Statistics collection and reporting utilities.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, fixed-name counter collection.
///
/// Names are declared up front; incrementing an undeclared name is ignored
/// so hot paths never allocate.
pub struct StatsCounter {
    counters: BTreeMap<&'static str, AtomicU64>,
}

/// Plain copy of every counter at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot(pub BTreeMap<&'static str, u64>);

impl StatsSnapshot {
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }
}

impl StatsCounter {
    pub fn new(names: &[&'static str]) -> Self {
        let counters = names
            .iter()
            .map(|&name| (name, AtomicU64::new(0)))
            .collect();
        Self { counters }
    }

    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot(
            self.counters
                .iter()
                .map(|(&k, v)| (k, v.load(Ordering::Relaxed)))
                .collect(),
        )
    }
}
