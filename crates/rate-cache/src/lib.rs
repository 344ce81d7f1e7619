//! Rate cache for FxAgg
//!
//! Holds a bounded FIFO history per (platform, rate name). Updates run the
//! filter chain against the key's history before they are appended.
//!
//! # Key Invariants
//!
//! - A key's history never exceeds `max_size`; the oldest entry is evicted first
//! - The first value for a key is only accepted while the history is empty
//! - A rejected update leaves the history untouched

pub mod cache;

pub use cache::{RateCache, RateSnapshot};
