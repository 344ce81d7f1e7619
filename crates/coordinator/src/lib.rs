//! Pipeline coordinator for FxAgg
//!
//! Receives provider events and drives the rest of the pipeline:
//! cache -> store -> calculation -> publish -> consume.
//!
//! # Core Components
//!
//! - [`coordinator`] - `Coordinator`, the `ProviderListener` implementation
//! - [`loader`] - starts providers from platform configuration
//! - [`shutdown`] - process-wide cancellation

pub mod coordinator;
pub mod error;
pub mod loader;
pub mod shutdown;

pub use coordinator::{Coordinator, CycleReport};
pub use error::{CoordinatorError, CoordinatorResult};
pub use loader::{load_providers, ProviderSet};
pub use shutdown::ShutdownController;
