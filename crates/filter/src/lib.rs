//! Tick filters for FxAgg
//!
//! Every accepted update passes an ordered chain of filters before it is
//! written to the rate cache.
//!
//! # Core Components
//!
//! - [`traits`] - `RateFilter` trait and `FilterScope`
//! - [`jump_threshold`] - rejects sudden jumps from the last accepted value
//! - [`moving_average`] - rejects values far from the history mean
//! - [`service`] - `FilterService`, the ordered fail-closed chain
//! - [`registry`] - maps configured filter kinds to constructors
//!
//! # Key Invariants
//!
//! - Filters run in configuration order and stop at the first rejection
//! - A filter error rejects the candidate, it never propagates
//! - Outside its scope a filter accepts unconditionally

pub mod error;
pub mod jump_threshold;
pub mod moving_average;
pub mod registry;
pub mod service;
pub mod traits;

pub use error::FilterError;
pub use jump_threshold::JumpThresholdFilter;
pub use moving_average::MovingAverageFilter;
pub use registry::{FilterFactory, FilterRegistry};
pub use service::FilterService;
pub use traits::{FilterScope, RateFilter};

pub type Result<T> = std::result::Result<T, FilterError>;
