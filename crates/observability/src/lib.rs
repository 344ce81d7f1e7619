//! Observability infrastructure for FxAgg
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics
//! - Named pipeline metric helpers
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("fxagg", LogFormat::Pretty)?;
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, PipelineMetrics, TickKind};
