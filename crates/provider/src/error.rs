//! Provider error types

use thiserror::Error;

/// Malformed upstream input. Always dropped with a diagnostic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("expected at least {expected} fields, got {got}")]
    TooFewFields { expected: usize, got: usize },

    #[error("empty rate name")]
    EmptyName,

    #[error("malformed segment '{0}'")]
    BadSegment(String),

    #[error("invalid {field} value '{value}'")]
    BadNumber { field: &'static str, value: String },

    #[error("invalid timestamp '{0}'")]
    BadTimestamp(String),

    #[error("invalid JSON body: {0}")]
    Json(String),

    #[error("body is for {got}, requested {expected}")]
    NameMismatch { expected: String, got: String },
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider serves {expected}, not {got}")]
    UnknownPlatform { expected: String, got: String },

    #[error("Platform {platform} has no {setting} configured")]
    MissingSetting {
        platform: String,
        setting: &'static str,
    },

    #[error("Invalid {setting} for {platform}: {message}")]
    InvalidSetting {
        platform: String,
        setting: &'static str,
        message: String,
    },

    #[error("Unknown provider kind: {0}")]
    UnknownKind(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Wire(#[from] WireError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
