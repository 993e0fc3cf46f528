//! Core error types

use folio_storage::Response;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] folio_storage::StorageError),

    #[error("Network error: {0}")]
    Network(#[from] folio_proxy::ProxyError),

    #[error("Non-success status: {}", .0.status)]
    NonSuccessStatus(Box<Response>),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid worker state: {0}")]
    InvalidState(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
