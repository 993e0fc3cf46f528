//! Application state

use folio_core::Worker;
use folio_proxy::Fetcher;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use url::Url;

/// Prometheus render handle served at `/_folio/metrics`
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
    /// Network used for passthrough requests
    pub fetcher: Arc<dyn Fetcher>,
    /// Origin that origin-form request paths are resolved against
    pub origin: Option<Url>,
    /// Pending lifetime extensions, drained on shutdown
    pub tracker: TaskTracker,
}

impl AppState {
    pub fn new(
        worker: Arc<Worker>,
        fetcher: Arc<dyn Fetcher>,
        origin: Option<Url>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            worker,
            fetcher,
            origin,
            tracker,
        }
    }
}
