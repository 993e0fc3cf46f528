//! Worker: the event surface the host drives

use async_trait::async_trait;
use folio_proxy::Fetcher;
use folio_storage::{CacheStore, Request, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::error::CoreError;
use crate::event::ExtendableEvent;
use crate::eviction::{EvictionReport, EvictionSweeper};
use crate::lifecycle::{ActivationReport, LifecycleManager, WorkerState};
use crate::message::ControlMessage;
use crate::strategy::StrategyEngine;

/// What the host should do with an intercepted fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not handled; the host performs the request itself
    Passthrough,
    Respond(Response),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Respond(response) => Some(response),
        }
    }
}

/// Events delivered by the host environment
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Install the static partition, activating right away when
    /// skip-waiting has been requested
    async fn on_install(&self) -> Result<(), CoreError>;

    async fn on_activate(&self) -> Result<ActivationReport, CoreError>;

    async fn on_message(&self, message: ControlMessage) -> Result<(), CoreError>;

    /// Answer a fetch. Never fails: errors surface as synthetic responses.
    async fn on_fetch(&self, event: &ExtendableEvent, request: Request) -> FetchOutcome;

    async fn on_eviction_tick(&self) -> Result<EvictionReport, CoreError>;
}

/// A worker instance bound to one configuration
pub struct Worker {
    config: Arc<WorkerConfig>,
    store: CacheStore,
    clients: Arc<ClientRegistry>,
    lifecycle: LifecycleManager,
    engine: StrategyEngine,
    sweeper: EvictionSweeper,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        store: CacheStore,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let config = Arc::new(config);
        let clients = Arc::new(ClientRegistry::new());
        let lifecycle =
            LifecycleManager::new(config.clone(), store.clone(), fetcher.clone(), clients.clone());
        let engine = StrategyEngine::new(config.clone(), store.clone(), fetcher);
        let sweeper = EvictionSweeper::new(
            store.clone(),
            config.dynamic_cache.clone(),
            config.max_dynamic_entries,
        );

        Ok(Self {
            config,
            store,
            clients,
            lifecycle,
            engine,
            sweeper,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Whether a request from this client is answered by the worker
    ///
    /// Requests without a client id are treated as controlled once the
    /// worker is active.
    fn controls(&self, request: &Request) -> bool {
        let active = self.lifecycle.is_active();
        match request.client_id.as_deref() {
            Some(id) => self.clients.observe(id, active) && active,
            None => active,
        }
    }
}

#[async_trait]
impl EventHandler for Worker {
    async fn on_install(&self) -> Result<(), CoreError> {
        self.lifecycle.install().await?;

        if self.lifecycle.skip_waiting_requested() {
            self.on_activate().await?;
        }

        Ok(())
    }

    async fn on_activate(&self) -> Result<ActivationReport, CoreError> {
        self.lifecycle.activate().await
    }

    async fn on_message(&self, message: ControlMessage) -> Result<(), CoreError> {
        match message {
            ControlMessage::SkipWaiting => {
                info!("Received SKIP_WAITING");
                self.lifecycle.skip_waiting();
                if self.lifecycle.state() == WorkerState::Waiting {
                    self.on_activate().await?;
                }
                Ok(())
            }
        }
    }

    async fn on_fetch(&self, event: &ExtendableEvent, request: Request) -> FetchOutcome {
        // Register the client even when the request itself is bypassed
        let controlled = self.controls(&request);

        if !controlled || !self.engine.classifier().should_intercept(&request) {
            debug!(
                "Passthrough {} {} (controlled: {})",
                request.method, request.url, controlled
            );
            metrics::counter!("folio_passthrough_total").increment(1);
            return FetchOutcome::Passthrough;
        }

        FetchOutcome::Respond(self.engine.handle(event, &request).await)
    }

    async fn on_eviction_tick(&self) -> Result<EvictionReport, CoreError> {
        if !self.lifecycle.is_active() {
            warn!(
                "Eviction tick while {}, sweeping anyway",
                self.lifecycle.state().as_str()
            );
        }
        self.sweeper.sweep().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;
    use folio_storage::MemoryStorage;

    fn setup() -> (Worker, Arc<ScriptedFetcher>) {
        let config = WorkerConfig {
            static_assets: vec!["https://reader.example.com/index.html".to_string()],
            ..WorkerConfig::default()
        };
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(
            "https://reader.example.com/index.html",
            Response::new(200, "<html>shell</html>"),
        );
        let store = CacheStore::new(Arc::new(MemoryStorage::new()));
        let worker = Worker::new(config, store, fetcher.clone()).unwrap();
        (worker, fetcher)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = WorkerConfig {
            max_dynamic_entries: 0,
            ..WorkerConfig::default()
        };
        let store = CacheStore::new(Arc::new(MemoryStorage::new()));
        let result = Worker::new(config, store, Arc::new(ScriptedFetcher::new()));
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_install_activates_immediately() {
        let (worker, _) = setup();
        worker.on_install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_passthrough_before_activation() {
        let (worker, fetcher) = setup();
        let event = ExtendableEvent::new();

        let outcome = worker
            .on_fetch(&event, Request::get("https://reader.example.com/index.html"))
            .await;
        assert_eq!(outcome, FetchOutcome::Passthrough);
        assert_eq!(fetcher.calls("https://reader.example.com/index.html"), 0);
    }

    #[tokio::test]
    async fn test_failed_install_stays_uncontrolled() {
        let (worker, fetcher) = setup();
        fetcher.set_offline(true);

        assert!(worker.on_install().await.is_err());
        assert_eq!(worker.state(), WorkerState::Parsed);

        // SKIP_WAITING does not activate a worker that never installed
        worker.on_message(ControlMessage::SkipWaiting).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Parsed);

        // Retry once the network is back
        fetcher.set_offline(false);
        worker.on_install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_waiting_worker() {
        let (worker, _) = setup();
        worker.lifecycle.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Waiting);

        worker.on_message(ControlMessage::SkipWaiting).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Active);

        // Repeated messages are harmless
        worker.on_message(ControlMessage::SkipWaiting).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_served_from_cache_once_active() {
        let (worker, fetcher) = setup();
        worker.on_install().await.unwrap();
        fetcher.set_offline(true);

        let event = ExtendableEvent::new();
        let outcome = worker
            .on_fetch(
                &event,
                Request::get("https://reader.example.com/index.html").with_client("tab-1"),
            )
            .await;
        let response = outcome.response().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "<html>shell</html>");
        event.settled().await;
    }
}
