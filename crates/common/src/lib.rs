//! Common types and utilities for FxAgg
//!
//! This crate provides the rate value types shared by every stage of the
//! pipeline, plus the naming rules and wire codec that tie them together.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`rate`] - `RateFields`, `RateStatus` and `Rate`
//! - [`naming`] - Raw rate names, formula context keys and result names
//! - [`wire`] - Downstream publish record format

pub mod error;
pub mod naming;
pub mod rate;
pub mod wire;

pub use error::{Error, Result};
pub use naming::{context_key, instrument_of, platform_prefix, result_name, QuoteSide};
pub use rate::{Rate, RateFields, RateStatus};
pub use wire::{decode_record, encode_record, PublishedRecord};
