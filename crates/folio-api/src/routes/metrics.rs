//! Prometheus exposition of the worker counters

use axum::{
    Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::state::MetricsHandle;

/// Under the reserved prefix; every other path is a fetch event
pub const METRICS_PATH: &str = "/_folio/metrics";

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Create metrics routes with the Prometheus handle
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(render))
        .with_state(handle)
}

/// GET /_folio/metrics - cache hits and misses, synthetic responses,
/// evictions and passthroughs
async fn render(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        handle.render(),
    )
}
