//! Calculation error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or running the formula script
#[derive(Error, Debug)]
pub enum FormulaError {
    #[error("Unsupported calculation method: {0}")]
    UnsupportedMethod(String),

    #[error("Failed to read formula {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile formula {path}: {message}")]
    Compile { path: PathBuf, message: String },

    #[error("Formula failed for {target}: {message}")]
    Evaluation { target: String, message: String },

    #[error("Formula for {target} returned {message}, expected [bid, ask]")]
    BadReturnShape { target: String, message: String },
}

/// Per-target calculation failure
#[derive(Error, Debug)]
pub enum CalculationError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Input rate name has no platform prefix, so it has no context key
    #[error("Input {rate} from {platform} has no context key")]
    UnnamedInput { platform: String, rate: String },
}
