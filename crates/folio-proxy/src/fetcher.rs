//! Network capability trait

use async_trait::async_trait;
use folio_storage::{Request, Response};

use crate::error::ProxyError;

/// Fetches a request from the network
///
/// A response with any status counts as success; only transport-level
/// failures are errors. There is no internal deadline: a fetch fails only
/// when the underlying transport reports it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, ProxyError>;
}
