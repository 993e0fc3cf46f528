//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid partition name: {0}")]
    InvalidPartition(String),
}
