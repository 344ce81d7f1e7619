//! Filter error types

use thiserror::Error;

/// Errors raised while building or evaluating filters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Unknown filter kind in configuration
    #[error("Unknown filter type: {0}")]
    UnknownKind(String),

    /// Missing or out-of-range parameter
    #[error("Filter '{filter}': invalid parameter {param}: {message}")]
    InvalidParameter {
        filter: String,
        param: String,
        message: String,
    },

    /// Candidate or reference prices are not finite
    #[error("Filter '{filter}': non-finite price in {rate}")]
    NonFinite { filter: String, rate: String },
}
