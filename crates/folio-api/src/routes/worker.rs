//! Worker control endpoints: status, control channel, manual sweep

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use folio_core::{ControlMessage, EventHandler, EvictionReport, WorkerState};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PartitionStatus {
    pub name: String,
    pub entries: usize,
}

/// Snapshot of the worker and its cache
#[derive(Serialize)]
pub struct StatusResponse {
    pub state: WorkerState,
    pub partitions: Vec<PartitionStatus>,
    pub controlled_clients: usize,
    pub uncontrolled_clients: usize,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub accepted: String,
    pub state: WorkerState,
}

/// GET /_folio/status
async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let store = state.worker.store();

    let mut partitions = Vec::new();
    for name in store.partition_names().await? {
        let entries = store.entries(&name).await?.len();
        partitions.push(PartitionStatus { name, entries });
    }

    let clients = state.worker.clients();
    Ok(Json(StatusResponse {
        state: state.worker.state(),
        partitions,
        controlled_clients: clients.controlled_count(),
        uncontrolled_clients: clients.uncontrolled_count(),
    }))
}

/// POST /_folio/message - host control channel
async fn message(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = ControlMessage::from_json(&body)?;
    debug!("Control message: {:?}", message);

    state.worker.on_message(message.clone()).await?;

    let accepted = match message {
        ControlMessage::SkipWaiting => "SKIP_WAITING",
    };

    Ok(Json(MessageResponse {
        accepted: accepted.to_string(),
        state: state.worker.state(),
    }))
}

/// POST /_folio/sweep - run one eviction sweep now
async fn sweep(State(state): State<AppState>) -> Result<Json<EvictionReport>, ApiError> {
    let report = state.worker.on_eviction_tick().await?;
    info!("Manual sweep evicted {} entries", report.evicted);
    Ok(Json(report))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_folio/status", get(status))
        .route("/_folio/message", post(message))
        .route("/_folio/sweep", post(sweep))
}
