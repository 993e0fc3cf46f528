//! Scripted network for unit tests

use async_trait::async_trait;
use folio_proxy::{Fetcher, ProxyError};
use folio_storage::{Request, Response};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A [`Fetcher`] that answers from a script and counts calls per URL.
/// Unscripted URLs fail like an unreachable network.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<HashMap<String, usize>>,
    offline: Mutex<bool>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.routes.lock().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, ProxyError> {
        *self.calls.lock().entry(request.url.clone()).or_default() += 1;

        if *self.offline.lock() {
            return Err(ProxyError::Unavailable(request.url.clone()));
        }

        self.routes
            .lock()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| ProxyError::Unavailable(request.url.clone()))
    }
}
