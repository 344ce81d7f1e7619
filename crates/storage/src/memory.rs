//! In-memory rate store
//!
//! Same list semantics as the Redis store. Data is lost on restart.

use async_trait::async_trait;
use common::Rate;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::traits::{RateStore, StoreResult};

struct Entry {
    rates: VecDeque<Rate>,
    expires_at: Instant,
}

pub struct InMemoryRateStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    max_list_size: usize,
}

impl InMemoryRateStore {
    pub fn new(ttl: Duration, max_list_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_list_size: max_list_size.max(1),
        }
    }

    /// Entries at `key`, newest first. Empty if the key is missing or expired.
    pub fn list(&self, key: &str) -> Vec<Rate> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.rates.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn key_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn mark(&self, key: &str, timestamp: Option<i64>) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key).filter(|e| e.expires_at > now) else {
            return 0;
        };

        let mut marked = 0;
        for rate in entry.rates.iter_mut() {
            let matches = timestamp.map_or(true, |ts| rate.fields.timestamp == ts);
            if matches && rate.is_active() {
                rate.deactivate();
                marked += 1;
            }
        }
        marked
    }
}

impl Default for InMemoryRateStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 100)
    }
}

/// Redis-style glob match supporting `*` only
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn put(&self, key: &str, rate: &Rate) -> StoreResult<()> {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            rates: VecDeque::new(),
            expires_at,
        });

        // an expired list is gone, like a Redis key past its TTL
        if entry.expires_at <= Instant::now() {
            entry.rates.clear();
        }
        entry.rates.push_front(rate.clone());
        entry.rates.truncate(self.max_list_size);
        entry.expires_at = expires_at;
        Ok(())
    }

    async fn most_recent_active(&self, pattern: &str) -> StoreResult<Vec<(String, Rate)>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        let mut found: Vec<(String, Rate)> = entries
            .iter()
            .filter(|(key, entry)| entry.expires_at > now && glob_match(pattern, key))
            .filter_map(|(key, entry)| {
                entry
                    .rates
                    .iter()
                    .find(|r| r.is_active())
                    .map(|r| (key.clone(), r.clone()))
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    async fn mark_inactive(&self, key: &str, timestamp: i64) -> StoreResult<usize> {
        Ok(self.mark(key, Some(timestamp)))
    }

    async fn mark_all_inactive(&self, key: &str) -> StoreResult<usize> {
        Ok(self.mark(key, None))
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Expired rate lists purged");
        }
        Ok(purged)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
