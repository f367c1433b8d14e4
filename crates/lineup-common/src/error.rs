//! Error types shared across Lineup crates

use thiserror::Error;

/// Result type alias for Lineup operations
pub type Result<T> = std::result::Result<T, LineupError>;

/// Errors raised outside the per-row ingestion path (setup, configuration, I/O)
#[derive(Error, Debug)]
pub enum LineupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl LineupError {
    /// Build a configuration error for an environment variable that failed to parse
    pub fn invalid_env(name: &str, value: &str, expected: &str) -> Self {
        LineupError::Config(format!("{name}={value:?} is not a valid {expected}"))
    }
}
