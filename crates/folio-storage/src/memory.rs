//! In-memory storage backend

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::backend::{EntryInfo, NewEntry, StorageBackend, sort_by_insertion, validate_partition_name};
use crate::error::StorageError;
use crate::model::{CacheEntry, RequestKey};

#[derive(Default)]
struct MemoryPartition {
    entries: HashMap<RequestKey, CacheEntry>,
}

/// In-memory storage backend
///
/// Partitions are kept in creation order. An optional entry quota makes
/// writes of new keys fail with [`StorageError::QuotaExceeded`] once the
/// total entry count across all partitions reaches it.
#[derive(Default)]
pub struct MemoryStorage {
    partitions: RwLock<Vec<(String, MemoryPartition)>>,
    sequence: AtomicU64,
    max_entries: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that holds at most `max_entries` entries in total
    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::default()
        }
    }

    fn total_entries(partitions: &[(String, MemoryPartition)]) -> usize {
        partitions.iter().map(|(_, p)| p.entries.len()).sum()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn create_partition(&self, partition: &str) -> Result<(), StorageError> {
        validate_partition_name(partition)?;

        let mut partitions = self.partitions.write();
        if !partitions.iter().any(|(name, _)| name == partition) {
            debug!("Creating partition {}", partition);
            partitions.push((partition.to_string(), MemoryPartition::default()));
        }
        Ok(())
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError> {
        let mut partitions = self.partitions.write();
        let before = partitions.len();
        partitions.retain(|(name, _)| name != partition);
        Ok(partitions.len() != before)
    }

    async fn partitions(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .partitions
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn read(
        &self,
        partition: &str,
        key: &RequestKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let partitions = self.partitions.read();
        Ok(partitions
            .iter()
            .find(|(name, _)| name == partition)
            .and_then(|(_, p)| p.entries.get(key).cloned()))
    }

    async fn write(&self, partition: &str, entry: NewEntry) -> Result<EntryInfo, StorageError> {
        validate_partition_name(partition)?;

        let mut partitions = self.partitions.write();

        let exists = partitions
            .iter()
            .any(|(name, p)| name == partition && p.entries.contains_key(&entry.key));
        if let Some(max) = self.max_entries
            && !exists
            && Self::total_entries(&partitions) >= max
        {
            return Err(StorageError::QuotaExceeded(format!(
                "store holds the maximum of {} entries",
                max
            )));
        }

        let index = match partitions.iter().position(|(name, _)| name == partition) {
            Some(index) => index,
            None => {
                debug!("Creating partition {} on first write", partition);
                partitions.push((partition.to_string(), MemoryPartition::default()));
                partitions.len() - 1
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let info = EntryInfo {
            key: entry.key.clone(),
            inserted_at: entry.inserted_at,
            sequence,
            size: entry.response.body.len() as u64,
        };

        partitions[index].1.entries.insert(
            entry.key.clone(),
            CacheEntry {
                key: entry.key,
                response: entry.response,
                inserted_at: entry.inserted_at,
                sequence,
            },
        );

        Ok(info)
    }

    async fn remove(&self, partition: &str, key: &RequestKey) -> Result<bool, StorageError> {
        let mut partitions = self.partitions.write();
        Ok(partitions
            .iter_mut()
            .find(|(name, _)| name == partition)
            .map(|(_, p)| p.entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, partition: &str) -> Result<Vec<EntryInfo>, StorageError> {
        let mut entries: Vec<EntryInfo> = {
            let partitions = self.partitions.read();
            match partitions.iter().find(|(name, _)| name == partition) {
                Some((_, p)) => p
                    .entries
                    .values()
                    .map(|e| EntryInfo {
                        key: e.key.clone(),
                        inserted_at: e.inserted_at,
                        sequence: e.sequence,
                        size: e.response.body.len() as u64,
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        sort_by_insertion(&mut entries);
        Ok(entries)
    }
}
