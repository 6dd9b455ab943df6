//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for shared helpers
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl CommonError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}
