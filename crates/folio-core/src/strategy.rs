//! Fetch strategies
//!
//! Every intercepted request is classified and answered by one of three
//! strategies. All of them are total: they always produce a response,
//! falling back to a synthetic one when network and cache both fail.

use folio_proxy::Fetcher;
use folio_storage::{CacheStore, Request, Response};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::classify::{AssetClass, Classifier};
use crate::config::WorkerConfig;
use crate::error::CoreError;
use crate::event::ExtendableEvent;
use crate::offline;

/// Fetch strategy selected by request classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Static partition first, network on miss
    CacheFirst,
    /// Network first, cache fallback, synthetic 404
    NetworkFirst,
    /// Network first, cache fallback, offline page
    NetworkFirstOffline,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache_first",
            Strategy::NetworkFirst => "network_first",
            Strategy::NetworkFirstOffline => "network_first_offline",
        }
    }
}

impl From<AssetClass> for Strategy {
    fn from(class: AssetClass) -> Self {
        match class {
            AssetClass::Static => Strategy::CacheFirst,
            AssetClass::Document => Strategy::NetworkFirst,
            AssetClass::Other => Strategy::NetworkFirstOffline,
        }
    }
}

/// Executes fetch strategies against the cache store and the network
pub struct StrategyEngine {
    config: Arc<WorkerConfig>,
    classifier: Classifier,
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
}

impl StrategyEngine {
    pub fn new(config: Arc<WorkerConfig>, store: CacheStore, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            classifier: Classifier::new(&config),
            config,
            store,
            fetcher,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classify a request and answer it with the matching strategy
    pub async fn handle(&self, event: &ExtendableEvent, request: &Request) -> Response {
        let class = self.classifier.classify(&request.url);
        let strategy = Strategy::from(class);
        debug!("{} classified {} -> {}", request.url, class.as_str(), strategy.as_str());

        match strategy {
            Strategy::CacheFirst => self.cache_first(event, request).await,
            Strategy::NetworkFirst => self.network_first(event, request).await,
            Strategy::NetworkFirstOffline => self.network_first_offline(event, request).await,
        }
    }

    /// Cache-first for static assets
    ///
    /// A cached copy is returned without contacting the network. On a miss
    /// the network response is returned as is, and stored in the static
    /// partition when it is a 2xx. A network failure yields a 503.
    pub async fn cache_first(&self, event: &ExtendableEvent, request: &Request) -> Response {
        let strategy = Strategy::CacheFirst;

        if let Some(cached) = self.lookup(request, Some(&self.config.static_cache)).await {
            debug!("Static cache hit: {}", request.url);
            record_hit(strategy);
            return cached;
        }

        if let Some(cached) = self.lookup(request, None).await {
            debug!("Cache hit outside static partition: {}", request.url);
            record_hit(strategy);
            return cached;
        }

        record_miss(strategy);

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.cache_in_background(event, &self.config.static_cache, request, &response);
                } else {
                    debug!("Not caching {} (status {})", request.url, response.status);
                }
                response
            }
            Err(e) => {
                warn!("Network failure for static asset {}: {}", request.url, e);
                metrics::counter!("folio_network_failures_total").increment(1);
                synthetic(offline::static_unavailable())
            }
        }
    }

    /// Network-first with cache fallback for documents
    pub async fn network_first(&self, event: &ExtendableEvent, request: &Request) -> Response {
        let strategy = Strategy::NetworkFirst;

        match self.fetch_fresh(event, request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Network attempt for {} failed ({}), trying cache", request.url, e);
                match self.lookup(request, None).await {
                    Some(cached) => {
                        record_hit(strategy);
                        cached
                    }
                    None => {
                        record_miss(strategy);
                        synthetic(offline::document_unavailable())
                    }
                }
            }
        }
    }

    /// Network-first with offline page fallback for everything else
    ///
    /// When the network answered with a non-2xx status and nothing is
    /// cached, that network response is returned rather than the offline
    /// page.
    pub async fn network_first_offline(
        &self,
        event: &ExtendableEvent,
        request: &Request,
    ) -> Response {
        let strategy = Strategy::NetworkFirstOffline;

        match self.fetch_fresh(event, request).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Network attempt for {} failed ({}), trying cache", request.url, e);
                if let Some(cached) = self.lookup(request, None).await {
                    record_hit(strategy);
                    return cached;
                }
                record_miss(strategy);

                match e {
                    CoreError::NonSuccessStatus(response) => *response,
                    _ => synthetic(offline::offline_page()),
                }
            }
        }
    }

    /// Fetch from the network and schedule a dynamic-partition write on 2xx
    async fn fetch_fresh(
        &self,
        event: &ExtendableEvent,
        request: &Request,
    ) -> Result<Response, CoreError> {
        let response = self.fetcher.fetch(request).await.inspect_err(|_| {
            metrics::counter!("folio_network_failures_total").increment(1);
        })?;

        if !response.is_success() {
            return Err(CoreError::NonSuccessStatus(Box::new(response)));
        }

        self.cache_in_background(event, &self.config.dynamic_cache, request, &response);
        Ok(response)
    }

    /// Store a copy of `response` without delaying the caller
    ///
    /// The write is registered with the event so the event does not finish
    /// before it. Storage failures are logged and dropped.
    fn cache_in_background(
        &self,
        event: &ExtendableEvent,
        partition: &str,
        request: &Request,
        response: &Response,
    ) {
        let store = self.store.clone();
        let partition = partition.to_string();
        let request = request.clone();
        let response = response.clone();

        event.wait_until(async move {
            match store.put(&partition, &request, &response).await {
                Ok(_) => debug!("Cached {} in {}", request.url, partition),
                Err(e) => warn!("Failed to cache {} in {}: {}", request.url, partition, e),
            }
        });
    }

    /// Cache lookup that treats storage failures as a miss
    async fn lookup(&self, request: &Request, partition: Option<&str>) -> Option<Response> {
        match self.store.match_request(request, partition).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache lookup for {} failed: {}", request.url, e);
                None
            }
        }
    }
}

fn record_hit(strategy: Strategy) {
    metrics::counter!("folio_cache_hits_total", "strategy" => strategy.as_str()).increment(1);
}

fn record_miss(strategy: Strategy) {
    metrics::counter!("folio_cache_misses_total", "strategy" => strategy.as_str()).increment(1);
}

fn synthetic(response: Response) -> Response {
    metrics::counter!("folio_synthetic_responses_total", "status" => response.status.to_string())
        .increment(1);
    response
}
