

use thiserror::Error;


#[derive(Error, Debug)]
pub enum BulkOpsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid batch size: {0} (must be greater than 0)")]
    InvalidBatchSize(usize),

    #[error("Marker storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for BulkOpsError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}


pub type Result<T> = std::result::Result<T, BulkOpsError>;
