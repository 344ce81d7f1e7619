//! In-memory rate history keyed by (platform, rate name).

use common::{Rate, RateFields};
use filter::FilterService;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};

type History = Arc<Mutex<VecDeque<Rate>>>;

/// Newest rate per platform and rate name
pub type RateSnapshot = HashMap<String, HashMap<String, Rate>>;

/// Bounded per-key rate history.
///
/// Each key owns its own mutex, so writers of different keys never contend.
/// The outer lock only guards the key directory and is held just long enough
/// to find or create a key's history.
pub struct RateCache {
    max_size: usize,
    filters: Arc<FilterService>,
    entries: RwLock<HashMap<String, HashMap<String, History>>>,
}

impl RateCache {
    pub fn new(max_size: usize, filters: Arc<FilterService>) -> Self {
        Self {
            max_size: max_size.max(1),
            filters,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn history(&self, platform: &str, rate_name: &str) -> Option<History> {
        self.entries
            .read()
            .get(platform)
            .and_then(|rates| rates.get(rate_name))
            .cloned()
    }

    fn history_or_insert(&self, platform: &str, rate_name: &str) -> History {
        if let Some(history) = self.history(platform, rate_name) {
            return history;
        }
        self.entries
            .write()
            .entry(platform.to_string())
            .or_default()
            .entry(rate_name.to_string())
            .or_default()
            .clone()
    }

    /// True when the key has no history yet
    pub fn is_first_rate(&self, platform: &str, rate_name: &str) -> bool {
        self.history(platform, rate_name)
            .map_or(true, |history| history.lock().is_empty())
    }

    /// Store the first value for a key.
    ///
    /// Returns `None` without touching the cache if the key already has history.
    pub fn add_first_rate(&self, platform: &str, rate_name: &str, fields: RateFields) -> Option<Rate> {
        let history = self.history_or_insert(platform, rate_name);
        let mut history = history.lock();

        if !history.is_empty() {
            debug!(platform, rate = rate_name, "First rate already present, ignoring");
            return None;
        }

        let rate = Rate::first(rate_name, fields);
        history.push_back(rate.clone());
        trace!(platform, rate = %rate, "First rate cached");
        Some(rate)
    }

    /// Append an update for a key that already has history.
    ///
    /// The candidate is the last entry with `fields` applied, marked active and
    /// updated. It is appended only if the filter chain accepts it; otherwise
    /// the cache is left unchanged and `None` is returned.
    pub fn add_new_rate(&self, platform: &str, rate_name: &str, fields: RateFields) -> Option<Rate> {
        let Some(history) = self.history(platform, rate_name) else {
            warn!(platform, rate = rate_name, "Update for a key with no history, dropping");
            return None;
        };
        let mut history = history.lock();

        let last = history.back()?.clone();
        let candidate = last.with_fields(fields);

        if !self.filters.apply_all_filters(
            platform,
            rate_name,
            Some(&last),
            &candidate,
            history.make_contiguous(),
        ) {
            return None;
        }

        history.push_back(candidate.clone());
        while history.len() > self.max_size {
            history.pop_front();
        }
        trace!(platform, rate = %candidate, size = history.len(), "Rate updated in cache");
        Some(candidate)
    }

    /// Full history for a key, oldest first
    pub fn get_rates(&self, platform: &str, rate_name: &str) -> Vec<Rate> {
        self.history(platform, rate_name)
            .map(|history| history.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Active entries for a key, oldest first
    pub fn get_active_rates(&self, platform: &str, rate_name: &str) -> Vec<Rate> {
        self.history(platform, rate_name)
            .map(|history| {
                history
                    .lock()
                    .iter()
                    .filter(|r| r.is_active())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Newest active entry for a key
    pub fn latest_active(&self, platform: &str, rate_name: &str) -> Option<Rate> {
        let history = self.history(platform, rate_name)?;
        let history = history.lock();
        history.iter().rev().find(|r| r.is_active()).cloned()
    }

    /// Mark every active entry with the same tick identity as `rate` inactive.
    ///
    /// A poll that returns an unchanged quote appends entries sharing one
    /// tick identity; all of them go. Returns whether an entry was marked.
    pub fn mark_rate_to_non_active(&self, platform: &str, rate_name: &str, rate: &Rate) -> bool {
        let Some(history) = self.history(platform, rate_name) else {
            return false;
        };
        let mut history = history.lock();
        let mut marked = false;
        for entry in history
            .iter_mut()
            .filter(|r| r.is_active() && r.same_tick(rate))
        {
            entry.deactivate();
            trace!(platform, rate = %entry, "Rate marked inactive");
            marked = true;
        }
        marked
    }

    /// Mark every entry matching one of `rates` inactive. Returns the count marked.
    pub fn mark_rates_to_non_active(&self, platform: &str, rate_name: &str, rates: &[Rate]) -> usize {
        let Some(history) = self.history(platform, rate_name) else {
            return 0;
        };
        let mut history = history.lock();
        let mut marked = 0;
        for entry in history.iter_mut() {
            if entry.is_active() && rates.iter().any(|r| entry.same_tick(r)) {
                entry.deactivate();
                marked += 1;
            }
        }
        marked
    }

    /// Mark every active entry of a key inactive. Returns the count marked.
    pub fn mark_key_non_active(&self, platform: &str, rate_name: &str) -> usize {
        let Some(history) = self.history(platform, rate_name) else {
            return 0;
        };
        let mut history = history.lock();
        let mut marked = 0;
        for entry in history.iter_mut().filter(|r| r.is_active()) {
            entry.deactivate();
            marked += 1;
        }
        marked
    }

    /// Newest entry of every key, grouped by platform, whatever its status.
    ///
    /// A consumed or withdrawn newest entry stays in the snapshot so the
    /// calculator sees it as not fresh. Older active entries never stand in
    /// for it.
    pub fn snapshot_latest(&self) -> RateSnapshot {
        let entries = self.entries.read();
        let mut snapshot = RateSnapshot::new();

        for (platform, rates) in entries.iter() {
            for (rate_name, history) in rates {
                if let Some(rate) = history.lock().back() {
                    snapshot
                        .entry(platform.clone())
                        .or_default()
                        .insert(rate_name.clone(), rate.clone());
                }
            }
        }
        snapshot
    }

    /// Number of (platform, rate) keys
    pub fn key_count(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FilterConfig;
    use filter::FilterRegistry;
    use std::collections::HashMap as StdHashMap;

    fn fields(bid: f64, ask: f64, ts: i64) -> RateFields {
        RateFields::new(bid, ask, ts)
    }

    fn cache(max_size: usize) -> RateCache {
        RateCache::new(max_size, Arc::new(FilterService::empty()))
    }

    fn jump_filtered_cache(fraction: f64) -> RateCache {
        let config = FilterConfig {
            kind: "jump_threshold".to_string(),
            name: None,
            enabled: true,
            params: StdHashMap::from([("max_jump_fraction".to_string(), fraction)]),
            scope: None,
        };
        let filters =
            FilterService::from_config(&[config], &FilterRegistry::with_defaults()).unwrap();
        RateCache::new(10, Arc::new(filters))
    }

    #[test]
    fn test_first_rate_once_per_key() {
        let cache = cache(5);
        assert!(cache.is_first_rate("PF1", "PF1_USDTRY"));

        let first = cache
            .add_first_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1))
            .unwrap();
        assert!(first.status.active);
        assert!(!first.status.updated);
        assert!(!cache.is_first_rate("PF1", "PF1_USDTRY"));

        assert!(cache
            .add_first_rate("PF1", "PF1_USDTRY", fields(35.0, 35.1, 2))
            .is_none());
        assert_eq!(cache.get_rates("PF1", "PF1_USDTRY").len(), 1);
    }

    #[test]
    fn test_update_requires_history() {
        let cache = cache(5);
        assert!(cache
            .add_new_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1))
            .is_none());
        assert!(cache.get_rates("PF1", "PF1_USDTRY").is_empty());
    }

    #[test]
    fn test_update_is_active_and_updated() {
        let cache = cache(5);
        cache.add_first_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1));
        let updated = cache
            .add_new_rate("PF1", "PF1_USDTRY", fields(34.2, 34.3, 2))
            .unwrap();

        assert!(updated.status.is_fresh());
        assert_eq!(updated.name, "PF1_USDTRY");
        let history = cache.get_rates("PF1", "PF1_USDTRY");
        assert_eq!(history.len(), 2);
        // the first entry keeps its own status
        assert!(!history[0].status.updated);
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let max_size = 3;
        let k = 4;
        let cache = cache(max_size);
        cache.add_first_rate("PF1", "PF1_EURUSD", fields(1.0, 1.1, 0));
        for i in 1..(max_size + k) as i64 {
            cache.add_new_rate("PF1", "PF1_EURUSD", fields(1.0, 1.1, i));
        }

        let history = cache.get_rates("PF1", "PF1_EURUSD");
        let stamps: Vec<i64> = history.iter().map(|r| r.fields.timestamp).collect();
        assert_eq!(stamps, vec![4, 5, 6]);
    }

    #[test]
    fn test_filter_rejection_leaves_cache_unchanged() {
        let cache = jump_filtered_cache(0.05);
        cache.add_first_rate("PF1", "PF1_USDTRY", fields(100.0, 101.0, 1));

        assert!(cache
            .add_new_rate("PF1", "PF1_USDTRY", fields(106.0, 101.0, 2))
            .is_none());
        assert_eq!(cache.get_rates("PF1", "PF1_USDTRY").len(), 1);

        assert!(cache
            .add_new_rate("PF1", "PF1_USDTRY", fields(104.0, 101.0, 3))
            .is_some());
        assert_eq!(cache.get_rates("PF1", "PF1_USDTRY").len(), 2);
    }

    #[test]
    fn test_mark_non_active_by_tick_identity() {
        let cache = cache(5);
        cache.add_first_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1));
        let second = cache
            .add_new_rate("PF1", "PF1_USDTRY", fields(34.2, 34.3, 2))
            .unwrap();

        // a copy with different prices but the same tick identity
        let mut probe = second.clone();
        probe.fields.bid = 0.0;
        assert!(cache.mark_rate_to_non_active("PF1", "PF1_USDTRY", &probe));

        let active = cache.get_active_rates("PF1", "PF1_USDTRY");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].fields.timestamp, 1);
        assert_eq!(
            cache.latest_active("PF1", "PF1_USDTRY").unwrap().fields.timestamp,
            1
        );
    }

    #[test]
    fn test_mark_many_and_whole_key() {
        let cache = cache(5);
        cache.add_first_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1));
        cache.add_new_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 2));
        cache.add_new_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 3));

        let all = cache.get_rates("PF1", "PF1_USDTRY");
        assert_eq!(cache.mark_rates_to_non_active("PF1", "PF1_USDTRY", &all[..2]), 2);
        assert_eq!(cache.get_active_rates("PF1", "PF1_USDTRY").len(), 1);

        assert_eq!(cache.mark_key_non_active("PF1", "PF1_USDTRY"), 1);
        assert!(cache.latest_active("PF1", "PF1_USDTRY").is_none());
        assert_eq!(cache.mark_key_non_active("PF9", "PF9_USDTRY"), 0);
    }

    #[test]
    fn test_snapshot_groups_newest_per_key() {
        let cache = cache(5);
        cache.add_first_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1));
        cache.add_new_rate("PF1", "PF1_USDTRY", fields(34.2, 34.3, 2));
        cache.add_first_rate("PF2", "PF2_USDTRY", fields(34.1, 34.2, 1));
        cache.add_first_rate("PF2", "PF2_EURUSD", fields(1.08, 1.09, 1));
        cache.mark_key_non_active("PF2", "PF2_EURUSD");

        let snapshot = cache.snapshot_latest();
        assert_eq!(snapshot["PF1"]["PF1_USDTRY"].fields.timestamp, 2);
        assert_eq!(snapshot["PF2"].len(), 2);
        assert!(snapshot["PF2"]["PF2_USDTRY"].is_active());
        assert!(!snapshot["PF2"]["PF2_EURUSD"].is_active());
        assert_eq!(cache.key_count(), 3);
    }

    #[test]
    fn test_snapshot_keeps_consumed_newest() {
        let cache = cache(5);
        cache.add_first_rate("PF1", "PF1_USDTRY", fields(34.0, 34.1, 1));
        cache.add_new_rate("PF1", "PF1_USDTRY", fields(34.2, 34.3, 2));
        let newest = cache
            .add_new_rate("PF1", "PF1_USDTRY", fields(34.3, 34.4, 3))
            .unwrap();
        cache.mark_rate_to_non_active("PF1", "PF1_USDTRY", &newest);

        let snapshot = cache.snapshot_latest();
        let rate = &snapshot["PF1"]["PF1_USDTRY"];
        assert_eq!(rate.fields.timestamp, 3);
        assert!(!rate.status.is_fresh());
        // the older entries are still active in the history
        assert_eq!(cache.get_active_rates("PF1", "PF1_USDTRY").len(), 2);
    }

    #[test]
    fn test_mark_non_active_covers_repeated_tick() {
        let cache = cache(5);
        cache.add_first_rate("PF2", "PF2_USDTRY", fields(34.0, 34.1, 1));
        cache.add_new_rate("PF2", "PF2_USDTRY", fields(34.2, 34.3, 2));
        // an unchanged poll result repeats the tick
        let newest = cache
            .add_new_rate("PF2", "PF2_USDTRY", fields(34.2, 34.3, 2))
            .unwrap();

        assert!(cache.mark_rate_to_non_active("PF2", "PF2_USDTRY", &newest));
        assert!(!cache.mark_rate_to_non_active("PF2", "PF2_USDTRY", &newest));

        let active = cache.get_active_rates("PF2", "PF2_USDTRY");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].fields.timestamp, 1);
        assert!(!cache.snapshot_latest()["PF2"]["PF2_USDTRY"].is_active());
    }

    #[test]
    fn test_concurrent_writers_on_distinct_keys() {
        let cache = Arc::new(cache(50));
        let handles: Vec<_> = (0..4)
            .map(|p| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let platform = format!("PF{}", p);
                    let name = format!("{}_USDTRY", platform);
                    cache.add_first_rate(&platform, &name, fields(34.0, 34.1, 0));
                    for ts in 1..20 {
                        cache.add_new_rate(&platform, &name, fields(34.0, 34.1, ts));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.key_count(), 4);
        for p in 0..4 {
            let platform = format!("PF{}", p);
            let history = cache.get_rates(&platform, &format!("{}_USDTRY", platform));
            assert_eq!(history.len(), 20);
            assert!(history
                .windows(2)
                .all(|w| w[0].fields.timestamp < w[1].fields.timestamp));
        }
    }
}
