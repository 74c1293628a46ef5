//! Error types shared across the crate

use thiserror::Error;

/// Errors surfaced to callers of the library
#[derive(Debug, Error)]
pub enum AppError {
    /// The broadcast channel could not be joined
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// The coordinator task has already shut down
    #[error("Coordinator stopped")]
    CoordinatorStopped,

    /// A per-field storage write carried a value of the wrong shape
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn channel_unavailable(msg: &str) -> Self {
        AppError::ChannelUnavailable(msg.to_string())
    }

    pub fn invalid_value(key: &str, msg: &str) -> Self {
        AppError::InvalidValue {
            key: key.to_string(),
            message: msg.to_string(),
        }
    }

    pub fn internal(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
