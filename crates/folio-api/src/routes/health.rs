//! Liveness endpoint

use axum::{Json, Router, extract::State, routing::get};
use folio_core::WorkerState;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub worker: WorkerState,
    /// Whether intercepted requests are answered by the worker
    pub serving: bool,
}

/// Healthy whenever it answers; `serving` is false until the worker activates
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("folio_cache_health_checks_total").increment(1);

    let worker = state.worker.state();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        worker,
        serving: worker == WorkerState::Active,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/_folio/health", get(health))
}
