//! Partitioned cache store facade

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{EntryInfo, NewEntry, StorageBackend};
use crate::error::StorageError;
use crate::model::{Request, RequestKey, Response};

/// Cache store facade over a [`StorageBackend`]
///
/// Errors from the backend are always returned to the caller; deciding
/// whether a failure is tolerable is left to the caller's policy.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn StorageBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Open a partition, creating it on first use
    pub async fn open(&self, name: &str) -> Result<Partition, StorageError> {
        self.backend.create_partition(name).await?;
        Ok(self.partition(name))
    }

    /// Get a handle to a partition without creating it
    ///
    /// The partition is created lazily by the first `put`.
    pub fn partition(&self, name: &str) -> Partition {
        Partition {
            name: name.to_string(),
            store: self.clone(),
        }
    }

    /// Look up a request in one partition, or across every partition in
    /// creation order when `partition` is `None`
    pub async fn match_request(
        &self,
        request: &Request,
        partition: Option<&str>,
    ) -> Result<Option<Response>, StorageError> {
        let key = request.key();

        if let Some(partition) = partition {
            return Ok(self
                .backend
                .read(partition, &key)
                .await?
                .map(|entry| entry.response));
        }

        for name in self.backend.partitions().await? {
            if let Some(entry) = self.backend.read(&name, &key).await? {
                debug!("Global match for {} in {}", key, name);
                return Ok(Some(entry.response));
            }
        }

        Ok(None)
    }

    /// Store a copy of `response` under the request's key
    ///
    /// The caller keeps its own `response`; the stored entry is a separate
    /// value stamped with the current insertion time.
    pub async fn put(
        &self,
        partition: &str,
        request: &Request,
        response: &Response,
    ) -> Result<EntryInfo, StorageError> {
        self.backend
            .write(
                partition,
                NewEntry {
                    key: request.key(),
                    response: response.clone(),
                    inserted_at: Utc::now(),
                },
            )
            .await
    }

    /// Remove one entry; returns false if it was absent
    pub async fn delete(&self, partition: &str, request: &Request) -> Result<bool, StorageError> {
        self.backend.remove(partition, &request.key()).await
    }

    /// Remove one entry by key
    pub async fn delete_key(&self, partition: &str, key: &RequestKey) -> Result<bool, StorageError> {
        self.backend.remove(partition, key).await
    }

    /// Stored request keys of a partition, oldest first
    pub async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, StorageError> {
        Ok(self
            .backend
            .list(partition)
            .await?
            .into_iter()
            .map(|e| e.key)
            .collect())
    }

    /// Entry listing of a partition, oldest first
    pub async fn entries(&self, partition: &str) -> Result<Vec<EntryInfo>, StorageError> {
        self.backend.list(partition).await
    }

    /// Names of all partitions currently present
    pub async fn partition_names(&self) -> Result<Vec<String>, StorageError> {
        self.backend.partitions().await
    }

    /// Delete a whole partition
    pub async fn delete_partition(&self, name: &str) -> Result<bool, StorageError> {
        self.backend.delete_partition(name).await
    }
}

/// Handle to a named partition
#[derive(Clone)]
pub struct Partition {
    name: String,
    store: CacheStore,
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, StorageError> {
        self.store.match_request(request, Some(&self.name)).await
    }

    pub async fn put(&self, request: &Request, response: &Response) -> Result<EntryInfo, StorageError> {
        self.store.put(&self.name, request, response).await
    }

    pub async fn delete(&self, request: &Request) -> Result<bool, StorageError> {
        self.store.delete(&self.name, request).await
    }

    pub async fn keys(&self) -> Result<Vec<RequestKey>, StorageError> {
        self.store.keys(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    fn store() -> CacheStore {
        CacheStore::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let store = store();
        store.open("static-v1").await.unwrap();
        store.open("static-v1").await.unwrap();
        assert_eq!(store.partition_names().await.unwrap(), vec!["static-v1"]);
    }

    #[tokio::test]
    async fn test_partition_handle_is_lazy() {
        let store = store();
        let dynamic = store.partition("dynamic-v1");
        assert!(store.partition_names().await.unwrap().is_empty());

        let request = Request::get("https://example.com/book.epub");
        dynamic.put(&request, &Response::new(200, "epub")).await.unwrap();

        assert_eq!(store.partition_names().await.unwrap(), vec!["dynamic-v1"]);
        assert_eq!(dynamic.keys().await.unwrap(), vec![request.key()]);
    }

    #[tokio::test]
    async fn test_scoped_and_global_match() {
        let store = store();
        let request = Request::get("https://example.com/app.js");
        store.put("static-v1", &request, &Response::new(200, "js")).await.unwrap();

        assert!(store.match_request(&request, Some("dynamic-v1")).await.unwrap().is_none());
        assert_eq!(
            store.match_request(&request, Some("static-v1")).await.unwrap().unwrap().text(),
            "js"
        );
        assert_eq!(store.match_request(&request, None).await.unwrap().unwrap().text(), "js");
    }

    #[tokio::test]
    async fn test_put_leaves_original_readable() {
        let store = store();
        let request = Request::get("https://example.com/book.epub");
        let response = Response::new(200, "chapter one");

        store.put("dynamic-v1", &request, &response).await.unwrap();

        // Both the caller's copy and the stored copy read in full
        assert_eq!(response.text(), "chapter one");
        let stored = store.match_request(&request, None).await.unwrap().unwrap();
        assert_eq!(stored.body, response.body);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        let request = Request::get("https://example.com/x.css");
        store.put("static-v1", &request, &Response::new(200, "")).await.unwrap();

        assert!(store.delete("static-v1", &request).await.unwrap());
        assert!(!store.delete("static-v1", &request).await.unwrap());
        assert!(store.keys("static-v1").await.unwrap().is_empty());
    }
}
