//! Rate store for FxAgg
//!
//! Externalizes raw and calculated rates so they outlive the process.
//!
//! # Core Components
//!
//! - [`traits`] - `RateStore` contract and key layout
//! - [`memory`] - `InMemoryRateStore`, the default backend
//! - [`redis_store`] - `RedisRateStore`
//! - [`retention`] - background purge task
//! - [`factory`] - backend selection from configuration

pub mod factory;
pub mod memory;
pub mod redis_store;
pub mod retention;
pub mod traits;

pub use factory::create_store;
pub use memory::InMemoryRateStore;
pub use redis_store::RedisRateStore;
pub use retention::spawn_retention;
pub use traits::{
    calculated_key, raw_key, RateStore, StoreError, StoreResult, CALCULATED_PATTERN, RAW_PATTERN,
};
