//! Per-contestant sample history with lazy eviction.
//!
//! Series invariants: timestamps strictly increase and totals never decrease.
//! A sample that would break either is dropped with a warning instead of being
//! stored, so window queries can rely on both orderings.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use tally_store::{TallyStore, TallyView};
use tally_types::{ContestantId, Timestamp, TrendDirection};
use tally_utils::{read, write};

use crate::sample::{Trend, TrendSample};

/// Lookback used for `last_24h_change`.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// How long samples are kept: twice the default window.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(48 * 60 * 60);
/// Default sampler cadence.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Bounded time series of contestant totals.
pub struct TrendTracker {
    series: RwLock<HashMap<ContestantId, VecDeque<(Timestamp, u64)>>>,
    retention: Duration,
    /// Hard cap per series, derived from retention / sample interval.
    max_samples: usize,
}

impl TrendTracker {
    pub fn new(retention: Duration, sample_interval: Duration) -> Self {
        let interval_ms = sample_interval.as_millis().max(1);
        let per_window = retention.as_millis() / interval_ms;
        // One extra slot so a sample sitting exactly on the window edge survives.
        let max_samples = usize::try_from(per_window)
            .unwrap_or(usize::MAX)
            .saturating_add(2);
        Self {
            series: RwLock::new(HashMap::new()),
            retention,
            max_samples,
        }
    }

    /// Record every contestant's current total from the store.
    pub fn sample(&self, store: &TallyStore, now: Timestamp) -> usize {
        self.record_view(&store.read_view(now))
    }

    /// Record every row of `view` at `view.taken_at`.
    ///
    /// Series for contestants missing from the view (archived) are dropped and
    /// expired samples are evicted. Returns the number of samples appended.
    pub fn record_view(&self, view: &TallyView) -> usize {
        let now = view.taken_at;
        let cutoff = now.saturating_sub(self.retention);
        let mut series = write(&self.series);

        let present: HashSet<&ContestantId> = view.tallies.iter().map(|t| t.id()).collect();
        series.retain(|id, _| present.contains(id));

        let mut appended = 0;
        for tally in &view.tallies {
            let samples = series.entry(tally.id().clone()).or_default();
            let total = tally.total();
            if let Some(&(last_at, last_total)) = samples.back() {
                if now <= last_at {
                    continue;
                }
                if total < last_total {
                    tracing::warn!(
                        contestant = %tally.id(),
                        last_total,
                        total,
                        "dropping trend sample below previous total"
                    );
                    continue;
                }
            }
            samples.push_back((now, total));
            appended += 1;
            evict(samples, cutoff, self.max_samples);
        }
        appended
    }

    /// Drop expired samples from every series, and empty series entirely.
    pub fn compact(&self, now: Timestamp) {
        let cutoff = now.saturating_sub(self.retention);
        let mut series = write(&self.series);
        for samples in series.values_mut() {
            evict(samples, cutoff, self.max_samples);
        }
        series.retain(|_, samples| !samples.is_empty());
    }

    /// Drop one contestant's series immediately.
    pub fn forget(&self, contestant: &ContestantId) -> bool {
        write(&self.series).remove(contestant).is_some()
    }

    /// `current_total` minus the oldest sample taken within `window` of `now`.
    ///
    /// Returns 0 when no sample falls inside the window.
    pub fn delta_over_window(
        &self,
        contestant: &ContestantId,
        window: Duration,
        now: Timestamp,
        current_total: u64,
    ) -> i64 {
        let cutoff = now.saturating_sub(window);
        let series = read(&self.series);
        let Some(samples) = series.get(contestant) else {
            return 0;
        };
        // Timestamps are strictly increasing, so the first match is the oldest.
        match samples.iter().find(|(at, _)| *at >= cutoff && *at <= now) {
            Some(&(_, baseline)) => signed_difference(current_total, baseline),
            None => 0,
        }
    }

    /// Delta over `window` together with its direction.
    pub fn trend(
        &self,
        contestant: &ContestantId,
        window: Duration,
        epsilon: u64,
        now: Timestamp,
        current_total: u64,
    ) -> Trend {
        let delta = self.delta_over_window(contestant, window, now, current_total);
        Trend {
            delta,
            direction: Self::trend_direction(delta, epsilon),
        }
    }

    pub fn trend_direction(delta: i64, epsilon: u64) -> TrendDirection {
        TrendDirection::classify(delta, epsilon)
    }

    /// All retained samples for one contestant, oldest first.
    pub fn samples(&self, contestant: &ContestantId) -> Vec<TrendSample> {
        read(&self.series)
            .get(contestant)
            .map(|samples| {
                samples
                    .iter()
                    .map(|&(timestamp, total_at_sample)| TrendSample {
                        contestant_id: contestant.clone(),
                        timestamp,
                        total_at_sample,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of retained samples across all contestants.
    pub fn sample_count(&self) -> usize {
        read(&self.series).values().map(VecDeque::len).sum()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

impl Default for TrendTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION, DEFAULT_SAMPLE_INTERVAL)
    }
}

fn evict(samples: &mut VecDeque<(Timestamp, u64)>, cutoff: Timestamp, max_samples: usize) {
    while samples.front().is_some_and(|(at, _)| *at < cutoff) {
        samples.pop_front();
    }
    while samples.len() > max_samples {
        samples.pop_front();
    }
}

fn signed_difference(current: u64, baseline: u64) -> i64 {
    if current >= baseline {
        i64::try_from(current - baseline).unwrap_or(i64::MAX)
    } else {
        i64::try_from(baseline - current)
            .map(|d| -d)
            .unwrap_or(i64::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{ContestantProfile, ContestantTally};

    const HOUR: u64 = 60 * 60;

    fn id(s: &str) -> ContestantId {
        ContestantId::new(s)
    }

    fn view(secs: u64, rows: &[(&str, u64)]) -> TallyView {
        let tallies = rows
            .iter()
            .map(|(name, total)| {
                let mut tally = ContestantTally::new(ContestantProfile::new(*name, "main"));
                tally.free_votes = *total;
                tally
            })
            .collect();
        TallyView::new(Timestamp::from_secs(secs), tallies)
    }

    fn tracker() -> TrendTracker {
        TrendTracker::new(Duration::from_secs(48 * HOUR), Duration::from_secs(HOUR))
    }

    #[test]
    fn day_window_delta_uses_oldest_sample_in_window() {
        let tracker = tracker();
        let now = 100 * HOUR;
        tracker.record_view(&view(now - 24 * HOUR, &[("a", 100)]));
        tracker.record_view(&view(now - HOUR, &[("a", 130)]));
        tracker.record_view(&view(now, &[("a", 150)]));

        let trend = tracker.trend(&id("a"), DEFAULT_WINDOW, 0, Timestamp::from_secs(now), 150);
        assert_eq!(trend.delta, 50);
        assert_eq!(trend.direction, TrendDirection::Up);
    }

    #[test]
    fn samples_older_than_window_are_ignored() {
        let tracker = tracker();
        let now = 100 * HOUR;
        tracker.record_view(&view(now - 30 * HOUR, &[("a", 10)]));
        tracker.record_view(&view(now - 2 * HOUR, &[("a", 80)]));

        let delta = tracker.delta_over_window(&id("a"), DEFAULT_WINDOW, Timestamp::from_secs(now), 95);
        assert_eq!(delta, 15);
    }

    #[test]
    fn no_sample_in_window_yields_zero_and_neutral() {
        let tracker = tracker();
        let now = 100 * HOUR;
        tracker.record_view(&view(now - 30 * HOUR, &[("a", 10)]));

        let trend = tracker.trend(&id("a"), DEFAULT_WINDOW, 0, Timestamp::from_secs(now), 500);
        assert_eq!(trend, Trend::default());

        let unknown = tracker.trend(&id("ghost"), DEFAULT_WINDOW, 0, Timestamp::from_secs(now), 7);
        assert_eq!(unknown.delta, 0);
        assert_eq!(unknown.direction, TrendDirection::Neutral);
    }

    #[test]
    fn epsilon_suppresses_small_changes() {
        let tracker = tracker();
        tracker.record_view(&view(HOUR, &[("a", 100)]));
        let trend = tracker.trend(&id("a"), DEFAULT_WINDOW, 5, Timestamp::from_secs(2 * HOUR), 104);
        assert_eq!(trend.delta, 4);
        assert_eq!(trend.direction, TrendDirection::Neutral);
    }

    #[test]
    fn non_increasing_timestamps_are_skipped() {
        let tracker = tracker();
        assert_eq!(tracker.record_view(&view(10, &[("a", 1)])), 1);
        assert_eq!(tracker.record_view(&view(10, &[("a", 2)])), 0);
        assert_eq!(tracker.record_view(&view(5, &[("a", 3)])), 0);
        assert_eq!(tracker.samples(&id("a")).len(), 1);
    }

    #[test]
    fn decreasing_totals_are_skipped() {
        let tracker = tracker();
        tracker.record_view(&view(10, &[("a", 50)]));
        assert_eq!(tracker.record_view(&view(20, &[("a", 40)])), 0);
        let samples = tracker.samples(&id("a"));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].total_at_sample, 50);
    }

    #[test]
    fn expired_samples_are_evicted_on_record() {
        let tracker = TrendTracker::new(Duration::from_secs(2 * HOUR), Duration::from_secs(HOUR));
        for h in 0..10 {
            tracker.record_view(&view(h * HOUR, &[("a", h)]));
        }
        let samples = tracker.samples(&id("a"));
        let oldest = samples.first().unwrap().timestamp;
        assert!(oldest >= Timestamp::from_secs(7 * HOUR));
        assert!(samples.len() <= 4);
    }

    #[test]
    fn series_length_is_capped() {
        // Retention of one hour sampled every minute allows 62 samples.
        let tracker = TrendTracker::new(Duration::from_secs(HOUR), Duration::from_secs(60));
        for s in 0..1_000u64 {
            tracker.record_view(&view(s, &[("a", s)]));
        }
        assert_eq!(tracker.samples(&id("a")).len(), 62);
    }

    #[test]
    fn archived_contestants_lose_their_series() {
        let tracker = tracker();
        tracker.record_view(&view(10, &[("a", 1), ("b", 2)]));
        tracker.record_view(&view(20, &[("a", 3)]));
        assert!(tracker.samples(&id("b")).is_empty());
        assert_eq!(tracker.sample_count(), 2);
    }

    #[test]
    fn forget_removes_series() {
        let tracker = tracker();
        tracker.record_view(&view(10, &[("a", 1)]));
        assert!(tracker.forget(&id("a")));
        assert!(!tracker.forget(&id("a")));
        assert_eq!(tracker.sample_count(), 0);
    }

    #[test]
    fn compact_drops_empty_series() {
        let tracker = TrendTracker::new(Duration::from_secs(HOUR), Duration::from_secs(60));
        tracker.record_view(&view(10, &[("a", 1)]));
        tracker.compact(Timestamp::from_secs(10 + 2 * HOUR));
        assert_eq!(tracker.sample_count(), 0);
    }

    #[test]
    fn sample_reads_from_store() {
        let store = TallyStore::default();
        store.register(ContestantProfile::new("a", "main")).unwrap();
        store
            .apply_increment(
                &id("a"),
                tally_types::VoteKind::Free,
                9,
                &tally_types::IdempotencyKey::new("k"),
                Timestamp::from_secs(1),
            )
            .unwrap();
        let tracker = tracker();
        assert_eq!(tracker.sample(&store, Timestamp::from_secs(5)), 1);
        assert_eq!(tracker.samples(&id("a"))[0].total_at_sample, 9);
    }

    #[test]
    fn signed_difference_handles_both_directions() {
        assert_eq!(signed_difference(10, 4), 6);
        assert_eq!(signed_difference(4, 10), -6);
        assert_eq!(signed_difference(u64::MAX, 0), i64::MAX);
    }
}
