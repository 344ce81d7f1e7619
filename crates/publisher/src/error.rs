//! Publisher error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    /// No usable producer; the message is dropped
    #[error("Producer unavailable: {0}")]
    Unavailable(String),

    #[error("Producer initialization failed: {0}")]
    Init(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] common::Error),
}
