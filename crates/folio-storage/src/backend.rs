//! Storage backend trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::model::{CacheEntry, RequestKey, Response};

/// An entry about to be written
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub key: RequestKey,
    pub response: Response,
    pub inserted_at: DateTime<Utc>,
}

/// Listing information for a stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: RequestKey,
    pub inserted_at: DateTime<Utc>,
    pub sequence: u64,
    pub size: u64,
}

/// Storage backend trait
///
/// Implementations hold named partitions of request-keyed responses.
/// A write to a single key completes as a unit; there are no cross-key
/// guarantees.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create a partition if it does not exist yet
    async fn create_partition(&self, partition: &str) -> Result<(), StorageError>;

    /// Delete a partition and every entry in it
    async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError>;

    /// Names of all partitions, in creation order
    async fn partitions(&self) -> Result<Vec<String>, StorageError>;

    /// Read an entry from a partition
    async fn read(
        &self,
        partition: &str,
        key: &RequestKey,
    ) -> Result<Option<CacheEntry>, StorageError>;

    /// Write an entry, creating the partition if needed and replacing any
    /// entry with the same key
    async fn write(&self, partition: &str, entry: NewEntry) -> Result<EntryInfo, StorageError>;

    /// Remove an entry
    async fn remove(&self, partition: &str, key: &RequestKey) -> Result<bool, StorageError>;

    /// List the entries of a partition ordered by insertion
    async fn list(&self, partition: &str) -> Result<Vec<EntryInfo>, StorageError>;
}

/// Validate a partition name
///
/// Names become directory names on disk, so only `[A-Za-z0-9._-]` is
/// accepted and a leading dot is rejected.
pub fn validate_partition_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.len() > 128 {
        return Err(StorageError::InvalidPartition(format!(
            "Partition name must be 1-128 characters: {:?}",
            name
        )));
    }

    if name.starts_with('.') {
        return Err(StorageError::InvalidPartition(format!(
            "Partition name must not start with '.': {}",
            name
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(StorageError::InvalidPartition(format!(
            "Invalid character {:?} in partition name: {}",
            c, name
        )));
    }

    Ok(())
}

/// Sort entry listings oldest first
pub(crate) fn sort_by_insertion(entries: &mut [EntryInfo]) {
    entries.sort_by(|a, b| {
        a.inserted_at
            .cmp(&b.inserted_at)
            .then(a.sequence.cmp(&b.sequence))
    });
}
