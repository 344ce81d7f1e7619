//! Upstream rate providers for FxAgg
//!
//! A provider connects to one platform's feed, tracks which instruments are
//! subscribed and turns incoming quotes into listener callbacks.
//!
//! # Core Components
//!
//! - [`traits`] - `Provider` and `ProviderListener` contracts
//! - [`tcp`] - line-oriented TCP feed with automatic reconnect
//! - [`rest`] - polled HTTP/JSON feed
//! - [`registry`] - builds providers from platform configuration
//!
//! # Key Invariants
//!
//! - The first tick of a subscribed instrument is delivered as
//!   `on_rate_available`, every later one as `on_rate_update`
//! - Ticks for instruments that are not subscribed are dropped
//! - Malformed records are logged and dropped, never fatal

pub mod dispatch;
pub mod error;
pub mod markers;
pub mod registry;
pub mod rest;
pub mod tcp;
pub mod traits;
pub mod wire;

#[cfg(test)]
mod testing;

pub use dispatch::TickDispatcher;
pub use error::{ProviderError, ProviderResult, WireError};
pub use markers::{Delivery, SentMarkers};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use rest::RestProvider;
pub use tcp::TcpProvider;
pub use traits::{ConnectParams, Provider, ProviderListener};
pub use wire::{Tick, UpstreamLine};
