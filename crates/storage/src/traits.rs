//! Store contract
//!
//! Every key holds a list of JSON-encoded rates, newest first, capped at a
//! maximum length and expiring after a TTL that is refreshed on every write.

use async_trait::async_trait;
use common::Rate;
use thiserror::Error;

/// Prefix of raw provider rates
pub const RAW_PREFIX: &str = "raw_rates";

/// Prefix of calculated rates
pub const CALCULATED_PREFIX: &str = "calculated_rates";

/// Pattern matching every raw rate key
pub const RAW_PATTERN: &str = "raw_rates:*";

/// Pattern matching every calculated rate key
pub const CALCULATED_PATTERN: &str = "calculated_rates:*";

/// `raw_rates:{platform}:{rate}`
pub fn raw_key(platform: &str, rate_name: &str) -> String {
    format!("{}:{}:{}", RAW_PREFIX, platform, rate_name)
}

/// `calculated_rates:{name}`
pub fn calculated_key(name: &str) -> String {
    format!("{}:{}", CALCULATED_PREFIX, name)
}

/// Errors that can occur in the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store configuration error: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed rate storage shared by every pipeline stage.
///
/// Failures are reported, never retried here; callers treat the store as
/// best effort.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Prepend `rate` to the list at `key`, trim the list and refresh its TTL
    async fn put(&self, key: &str, rate: &Rate) -> StoreResult<()>;

    /// Newest active rate of every key matching `pattern` (`*` wildcards).
    ///
    /// The pipeline only writes; this is the read side for consumers outside
    /// the process, such as a dashboard or a downstream service reading
    /// `calculated_rates:*`.
    async fn most_recent_active(&self, pattern: &str) -> StoreResult<Vec<(String, Rate)>>;

    /// Mark active entries at `key` with source `timestamp` inactive, atomically.
    ///
    /// Returns the number of entries changed.
    async fn mark_inactive(&self, key: &str, timestamp: i64) -> StoreResult<usize>;

    /// Mark every active entry at `key` inactive. Returns the number changed.
    async fn mark_all_inactive(&self, key: &str) -> StoreResult<usize>;

    /// Drop expired keys. Returns the number of keys removed.
    async fn purge_expired(&self) -> StoreResult<usize>;

    /// Backend name for diagnostics
    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(raw_key("PF1", "PF1_USDTRY"), "raw_rates:PF1:PF1_USDTRY");
        assert_eq!(calculated_key("EURTRY"), "calculated_rates:EURTRY");
    }
}
