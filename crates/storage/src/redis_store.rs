//! Redis rate store
//!
//! Lists are written with a single `LPUSH`/`LTRIM`/`EXPIRE` pipeline, so TTL
//! and trimming are enforced by the server. Deactivation runs as a Lua script
//! to stay atomic with concurrent writers.

use async_trait::async_trait;
use common::Rate;
use config::RedisConfig;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::traits::{RateStore, StoreResult};

/// Flips `"active":true` to `"active":false` in place for every entry whose
/// source timestamp equals ARGV[1] (every entry when ARGV[1] is empty).
///
/// The JSON is edited textually so integer timestamps survive unchanged.
const MARK_INACTIVE_SCRIPT: &str = r#"
local items = redis.call('LRANGE', KEYS[1], 0, -1)
local needle = nil
if ARGV[1] ~= '' then
  needle = '"timestamp":' .. ARGV[1] .. '}'
end
local marked = 0
for i, raw in ipairs(items) do
  if (needle == nil or string.find(raw, needle, 1, true))
      and string.find(raw, '"active":true', 1, true) then
    local updated = string.gsub(raw, '"active":true', '"active":false', 1)
    redis.call('LSET', KEYS[1], i - 1, updated)
    marked = marked + 1
  end
end
return marked
"#;

const SCAN_BATCH: usize = 100;

/// Connection URL for `config`, with the password only when one is set
pub fn connection_url(config: &RedisConfig) -> String {
    if config.password.is_empty() {
        format!("redis://{}:{}/{}", config.host, config.port, config.db_index)
    } else {
        format!(
            "redis://:{}@{}:{}/{}",
            config.password, config.host, config.port, config.db_index
        )
    }
}

pub struct RedisRateStore {
    redis: Arc<Mutex<ConnectionManager>>,
    mark_script: Script,
    ttl: Duration,
    max_list_size: usize,
}

impl RedisRateStore {
    pub async fn new(config: &RedisConfig, ttl: Duration, max_list_size: usize) -> StoreResult<Self> {
        info!(host = %config.host, port = config.port, db = config.db_index, "Connecting to Redis");

        let client = redis::Client::open(connection_url(config))?;
        let connection_manager = client.get_connection_manager().await?;

        Ok(Self {
            redis: Arc::new(Mutex::new(connection_manager)),
            mark_script: Script::new(MARK_INACTIVE_SCRIPT),
            ttl,
            max_list_size: max_list_size.max(1),
        })
    }

    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.redis.lock().await;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn run_mark_script(&self, key: &str, timestamp: Option<i64>) -> StoreResult<usize> {
        let arg = timestamp.map(|ts| ts.to_string()).unwrap_or_default();
        let mut conn = self.redis.lock().await;
        let marked: usize = self
            .mark_script
            .key(key)
            .arg(arg)
            .invoke_async(&mut *conn)
            .await?;
        Ok(marked)
    }
}

#[async_trait]
impl RateStore for RedisRateStore {
    async fn put(&self, key: &str, rate: &Rate) -> StoreResult<()> {
        let json = serde_json::to_string(rate)?;
        let stop = self.max_list_size as isize - 1;

        let mut conn = self.redis.lock().await;
        redis::pipe()
            .atomic()
            .lpush(key, json)
            .ignore()
            .ltrim(key, 0, stop)
            .ignore()
            .expire(key, self.ttl.as_secs() as i64)
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await?;

        debug!(key, rate = %rate.name, "Rate stored");
        Ok(())
    }

    async fn most_recent_active(&self, pattern: &str) -> StoreResult<Vec<(String, Rate)>> {
        let keys = self.scan(pattern).await?;
        let mut found = Vec::with_capacity(keys.len());

        for key in keys {
            let items: Vec<String> = {
                let mut conn = self.redis.lock().await;
                conn.lrange(&key, 0, -1).await?
            };

            let newest_active = items
                .iter()
                .filter_map(|raw| match serde_json::from_str::<Rate>(raw) {
                    Ok(rate) => Some(rate),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping undecodable stored rate");
                        None
                    }
                })
                .find(|rate| rate.is_active());

            if let Some(rate) = newest_active {
                found.push((key, rate));
            }
        }
        Ok(found)
    }

    async fn mark_inactive(&self, key: &str, timestamp: i64) -> StoreResult<usize> {
        self.run_mark_script(key, Some(timestamp)).await
    }

    async fn mark_all_inactive(&self, key: &str) -> StoreResult<usize> {
        self.run_mark_script(key, None).await
    }

    /// Expiry is enforced by Redis itself; nothing to purge client-side.
    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
