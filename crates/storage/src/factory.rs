//! Store selection from configuration

use config::{StoreBackend, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::memory::InMemoryRateStore;
use crate::redis_store::RedisRateStore;
use crate::traits::{RateStore, StoreError, StoreResult};

/// Create the configured store
pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn RateStore>> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    match config.backend {
        StoreBackend::Memory => {
            info!(ttl_secs = config.ttl_seconds, max_list_size = config.max_list_size, "Creating in-memory store");
            Ok(Arc::new(InMemoryRateStore::new(ttl, config.max_list_size)))
        }
        StoreBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| StoreError::Config("redis section required for the redis store".to_string()))?;
            info!("Creating Redis store");
            let store = RedisRateStore::new(redis, ttl, config.max_list_size).await?;
            Ok(Arc::new(store))
        }
    }
}
