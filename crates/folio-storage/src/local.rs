//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{EntryInfo, NewEntry, StorageBackend, sort_by_insertion, validate_partition_name};
use crate::error::StorageError;
use crate::model::{CacheEntry, RequestKey, Response};

const PARTITION_MARKER: &str = "partition.json";
const ENTRIES_DIR: &str = "entries";

/// Number of locks that same-key writes are serialized on
const WRITE_STRIPES: usize = 64;

/// Marker written when a partition is created
#[derive(Debug, Serialize, Deserialize)]
struct PartitionMarker {
    name: String,
    created_sequence: u64,
}

/// Per-entry metadata stored next to the body file
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    inserted_at: DateTime<Utc>,
    sequence: u64,
    body_file: String,
    size: u64,
}

impl EntryMeta {
    fn info(&self) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            inserted_at: self.inserted_at,
            sequence: self.sequence,
            size: self.size,
        }
    }
}

/// Local disk storage backend
///
/// Layout:
/// `<base_path>/partitions/<name>/partition.json`
/// `<base_path>/partitions/<name>/entries/<key digest>.json`
/// `<base_path>/partitions/<name>/entries/<key digest>-<sequence>.body`
///
/// The metadata file is renamed into place last and names its body file,
/// so a reader sees either the previous entry or the new one in full.
/// Writes and removals of one key are serialized, and each of them deletes
/// any body or temp file of that key the current metadata does not name.
pub struct LocalStorage {
    partitions_path: PathBuf,
    sequence: AtomicU64,
    write_locks: Vec<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let partitions_path = base_path.as_ref().join("partitions");
        fs::create_dir_all(&partitions_path).await?;

        let next = Self::scan_next_sequence(&partitions_path).await?;

        info!(
            "Initialized local storage at {:?} (next sequence {})",
            partitions_path, next
        );

        Ok(Self {
            partitions_path,
            sequence: AtomicU64::new(next),
            write_locks: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Find the sequence number after the highest one already on disk
    async fn scan_next_sequence(partitions_path: &Path) -> Result<u64, StorageError> {
        let mut max = None::<u64>;
        let mut dirs = fs::read_dir(partitions_path).await?;

        while let Some(dir) = dirs.next_entry().await? {
            if let Ok(marker) = read_json::<PartitionMarker>(&dir.path().join(PARTITION_MARKER)).await {
                max = max.max(Some(marker.created_sequence));
            }

            let entries_path = dir.path().join(ENTRIES_DIR);
            let Ok(mut entries) = fs::read_dir(&entries_path).await else {
                continue;
            };
            while let Some(file) = entries.next_entry().await? {
                if is_meta_file(&file.path())
                    && let Ok(meta) = read_json::<EntryMeta>(&file.path()).await
                {
                    max = max.max(Some(meta.sequence));
                }
            }
        }

        Ok(max.map(|m| m + 1).unwrap_or(0))
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn write_lock(&self, digest: &str) -> &Mutex<()> {
        let stripe = digest
            .get(..8)
            .and_then(|prefix| usize::from_str_radix(prefix, 16).ok())
            .unwrap_or(0);
        &self.write_locks[stripe % WRITE_STRIPES]
    }

    fn partition_path(&self, partition: &str) -> Result<PathBuf, StorageError> {
        validate_partition_name(partition)?;
        Ok(self.partitions_path.join(partition))
    }

    fn entries_path(&self, partition: &str) -> Result<PathBuf, StorageError> {
        Ok(self.partition_path(partition)?.join(ENTRIES_DIR))
    }

    fn meta_path(&self, partition: &str, key: &RequestKey) -> Result<PathBuf, StorageError> {
        Ok(self
            .entries_path(partition)?
            .join(format!("{}.json", key.digest())))
    }

    async fn read_meta(
        &self,
        partition: &str,
        key: &RequestKey,
    ) -> Result<Option<EntryMeta>, StorageError> {
        let path = self.meta_path(partition, key)?;
        match read_json::<EntryMeta>(&path).await {
            Ok(meta) => Ok(Some(meta)),
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn create_partition(&self, partition: &str) -> Result<(), StorageError> {
        let path = self.partition_path(partition)?;
        let marker_path = path.join(PARTITION_MARKER);

        if fs::try_exists(&marker_path).await? {
            return Ok(());
        }

        debug!("Creating partition at {:?}", path);
        fs::create_dir_all(path.join(ENTRIES_DIR)).await?;

        let marker = PartitionMarker {
            name: partition.to_string(),
            created_sequence: self.next_sequence(),
        };
        write_atomic(&marker_path, &serde_json::to_vec(&marker)?, marker.created_sequence).await
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError> {
        let path = self.partition_path(partition)?;
        debug!("Deleting partition at {:?}", path);

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn partitions(&self) -> Result<Vec<String>, StorageError> {
        let mut markers = Vec::new();
        let mut dirs = fs::read_dir(&self.partitions_path).await?;

        while let Some(dir) = dirs.next_entry().await? {
            match read_json::<PartitionMarker>(&dir.path().join(PARTITION_MARKER)).await {
                Ok(marker) => markers.push(marker),
                Err(e) => warn!("Skipping partition directory {:?}: {}", dir.path(), e),
            }
        }

        markers.sort_by_key(|m| m.created_sequence);
        Ok(markers.into_iter().map(|m| m.name).collect())
    }

    async fn read(
        &self,
        partition: &str,
        key: &RequestKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let Some(meta) = self.read_meta(partition, key).await? else {
            return Ok(None);
        };

        let body_path = self.entries_path(partition)?.join(&meta.body_file);
        let body = match fs::read(&body_path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Entry metadata without body for {} in {}", key, partition);
                return Ok(None);
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(Some(CacheEntry {
            key: meta.key,
            response: Response {
                status: meta.status,
                headers: meta.headers,
                body,
            },
            inserted_at: meta.inserted_at,
            sequence: meta.sequence,
        }))
    }

    async fn write(&self, partition: &str, entry: NewEntry) -> Result<EntryInfo, StorageError> {
        self.create_partition(partition).await?;

        let entries_path = self.entries_path(partition)?;
        let digest = entry.key.digest();
        let _guard = self.write_lock(&digest).lock().await;

        let sequence = self.next_sequence();
        let body_file = format!("{}-{}.body", digest, sequence);
        let body_path = entries_path.join(&body_file);

        debug!("Writing {} to {:?}", entry.key, entries_path);

        write_atomic(&body_path, &entry.response.body, sequence).await?;

        let meta = EntryMeta {
            key: entry.key,
            status: entry.response.status,
            headers: entry.response.headers,
            inserted_at: entry.inserted_at,
            sequence,
            body_file,
            size: entry.response.body.len() as u64,
        };
        let written = match serde_json::to_vec(&meta) {
            Ok(data) => {
                write_atomic(&entries_path.join(format!("{}.json", digest)), &data, sequence).await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            remove_quietly(&body_path).await;
            return Err(e);
        }

        remove_stale_files(&entries_path, &digest, Some(&meta.body_file)).await;

        Ok(meta.info())
    }

    async fn remove(&self, partition: &str, key: &RequestKey) -> Result<bool, StorageError> {
        let digest = key.digest();
        let _guard = self.write_lock(&digest).lock().await;

        if self.read_meta(partition, key).await?.is_none() {
            return Ok(false);
        }

        let entries_path = self.entries_path(partition)?;
        debug!("Removing {} from {:?}", key, entries_path);

        match fs::remove_file(self.meta_path(partition, key)?).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::Io(e)),
        }

        remove_stale_files(&entries_path, &digest, None).await;
        Ok(true)
    }

    async fn list(&self, partition: &str) -> Result<Vec<EntryInfo>, StorageError> {
        let entries_path = self.entries_path(partition)?;

        let mut dir = match fs::read_dir(&entries_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(file) = dir.next_entry().await? {
            if !is_meta_file(&file.path()) {
                continue;
            }
            match read_json::<EntryMeta>(&file.path()).await {
                Ok(meta) => entries.push(meta.info()),
                Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        sort_by_insertion(&mut entries);
        Ok(entries)
    }
}

fn is_meta_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StorageError> {
    let data = fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

/// Write a file through a uniquely named temp file and rename it into place
async fn write_atomic(path: &Path, data: &[u8], sequence: u64) -> Result<(), StorageError> {
    let temp_path = path.with_extension(format!("{}.tmp", sequence));
    let result = match fs::write(&temp_path, data).await {
        Ok(()) => fs::rename(&temp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        remove_quietly(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}

/// Delete body and temp files of `digest` other than `keep`
///
/// Callers hold the key's write lock.
async fn remove_stale_files(entries_path: &Path, digest: &str, keep: Option<&str>) {
    let mut dir = match fs::read_dir(entries_path).await {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Failed to scan {:?} for stale files: {}", entries_path, e);
            return;
        }
    };

    let body_prefix = format!("{}-", digest);
    let temp_prefix = format!("{}.", digest);

    loop {
        let file = match dir.next_entry().await {
            Ok(Some(file)) => file,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to scan {:?} for stale files: {}", entries_path, e);
                break;
            }
        };

        let name = file.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let stale_body = name.starts_with(&body_prefix) && keep != Some(name);
        let stale_temp = name.starts_with(&temp_prefix) && name.ends_with(".tmp");
        if stale_body || stale_temp {
            debug!("Removing stale file {}", name);
            remove_quietly(&file.path()).await;
        }
    }
}
