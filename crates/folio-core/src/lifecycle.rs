//! Worker lifecycle: install, waiting, activation

use folio_proxy::Fetcher;
use folio_storage::{CacheStore, Request, Response};
use futures::future::try_join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::error::CoreError;

/// Lifecycle state of a worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Not installed yet, or the last install failed
    Parsed,
    Installing,
    /// Installed, waiting to be activated
    Waiting,
    Activating,
    Active,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
        }
    }
}

/// Outcome of an activation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    /// Stale partitions that were deleted
    pub deleted: Vec<String>,
    /// Stale partitions whose deletion failed
    pub failed: Vec<String>,
    /// Clients taken over by this activation
    pub claimed: usize,
}

/// Drives the install and activate steps of a worker instance
pub struct LifecycleManager {
    config: Arc<WorkerConfig>,
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<ClientRegistry>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl LifecycleManager {
    pub fn new(
        config: Arc<WorkerConfig>,
        store: CacheStore,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            clients,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == WorkerState::Active
    }

    /// Move from `from` to `to` under one lock, or report the current state
    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), CoreError> {
        let mut state = self.state.write();
        if *state != from {
            return Err(CoreError::InvalidState(format!(
                "cannot move to {} while {}",
                to.as_str(),
                state.as_str()
            )));
        }
        *state = to;
        drop(state);

        info!("Worker state: {} -> {}", from.as_str(), to.as_str());
        Ok(())
    }

    fn set_state(&self, state: WorkerState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            info!("Worker state: {} -> {}", previous.as_str(), state.as_str());
        }
    }

    /// Request activation without waiting for older instances' clients
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Populate the static partition with the whole asset manifest
    ///
    /// All assets are fetched before anything is stored. Any fetch failure,
    /// non-2xx status or storage failure fails the install and leaves no
    /// static partition behind. On success the worker waits for activation
    /// with skip-waiting already requested.
    pub async fn install(&self) -> Result<usize, CoreError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;

        match self.precache().await {
            Ok(count) => {
                info!(
                    "Installed {} static assets into {}",
                    count, self.config.static_cache
                );
                self.set_state(WorkerState::Waiting);
                self.skip_waiting();
                Ok(count)
            }
            Err(e) => {
                error!("Install failed: {}", e);
                self.set_state(WorkerState::Parsed);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, CoreError> {
        let partition = self.store.open(&self.config.static_cache).await?;

        let fetched: Result<Vec<(Request, Response)>, CoreError> =
            try_join_all(self.config.static_assets.iter().map(|asset| async move {
                let url = self.config.asset_url(asset);
                let request = Request::get(url.as_str());
                let response = self
                    .fetcher
                    .fetch(&request)
                    .await
                    .map_err(|e| CoreError::Install(format!("{}: {}", url, e)))?;

                if !response.is_success() {
                    return Err(CoreError::Install(format!(
                        "{}: status {}",
                        url, response.status
                    )));
                }

                debug!("Fetched static asset {}", url);
                Ok::<_, CoreError>((request, response))
            }))
            .await;

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.discard_static().await;
                return Err(e);
            }
        };

        for (request, response) in &fetched {
            if let Err(e) = partition.put(request, response).await {
                self.discard_static().await;
                return Err(CoreError::Install(format!("{}: {}", request.url, e)));
            }
        }

        Ok(fetched.len())
    }

    async fn discard_static(&self) {
        if let Err(e) = self.store.delete_partition(&self.config.static_cache).await {
            warn!(
                "Failed to discard partial partition {}: {}",
                self.config.static_cache, e
            );
        }
    }

    /// Delete stale partitions and claim open clients
    ///
    /// Every partition other than the current static and dynamic ones is
    /// deleted; one failed deletion does not stop the rest.
    pub async fn activate(&self) -> Result<ActivationReport, CoreError> {
        self.transition(WorkerState::Waiting, WorkerState::Activating)?;

        let mut report = ActivationReport::default();
        let keep = self.config.current_partitions();

        match self.store.partition_names().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !keep.contains(&n.as_str())) {
                    match self.store.delete_partition(&name).await {
                        Ok(_) => {
                            info!("Deleted stale partition {}", name);
                            report.deleted.push(name);
                        }
                        Err(e) => {
                            warn!("Failed to delete stale partition {}: {}", name, e);
                            report.failed.push(name);
                        }
                    }
                }
            }
            Err(e) => error!("Failed to list partitions during activation: {}", e),
        }

        report.claimed = self.clients.claim();
        self.set_state(WorkerState::Active);

        info!(
            "Activated: {} stale partitions deleted, {} failed, {} clients claimed",
            report.deleted.len(),
            report.failed.len(),
            report.claimed
        );

        Ok(report)
    }
}
