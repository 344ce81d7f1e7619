//! Coordinator error types

use thiserror::Error;

/// Failures while assembling the pipeline. Runtime failures never surface
/// here; they are logged and counted where they happen.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Filter setup failed: {0}")]
    Filter(#[from] filter::FilterError),

    #[error("Store setup failed: {0}")]
    Store(#[from] storage::StoreError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
