//! Error types for delayable-engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown delayable: {0}")]
    UnknownDelayable(String),

    #[error("delayable {key} failed: {message}")]
    Task { key: String, message: String },

    #[error("arguments for {key} have the wrong type")]
    ArgsMismatch { key: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a step failure for the delayable registered under `key`.
    pub fn task(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
