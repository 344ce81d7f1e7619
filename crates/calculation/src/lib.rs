//! Cross-rate calculation for FxAgg
//!
//! # Core Components
//!
//! - [`formula`] - `DynamicFormulaService`, a sandboxed Rhai formula loaded once
//! - [`calculator`] - `RateCalculatorService`, builds formula contexts per target
//!
//! # Key Invariants
//!
//! - A target is only calculated when every input is active and updated
//! - One target's failure never prevents the others from being calculated
//! - The formula script is compiled at most once per service

pub mod calculator;
pub mod error;
pub mod formula;

pub use calculator::{
    CalculationOutcome, ConsumedInput, GroupedRates, RateCalculatorService, SkipReason,
};
pub use error::{CalculationError, FormulaError};
pub use formula::DynamicFormulaService;
