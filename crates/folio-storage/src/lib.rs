//! Folio Cache Storage Layer
//!
//! This crate provides the request/response model and the partitioned
//! cache store used by Folio Cache, with in-memory and local disk backends.

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod model;
pub mod store;

pub use backend::{EntryInfo, NewEntry, StorageBackend, validate_partition_name};
pub use error::StorageError;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use model::{CacheEntry, Request, RequestKey, Response};
pub use store::{CacheStore, Partition};
