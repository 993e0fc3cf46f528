//! Folio Cache HTTP adapter
//!
//! This crate provides the Axum-based host adapter for the worker: every
//! inbound request is offered to the worker as a fetch event, alongside the
//! control channel, status, health and metrics endpoints.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
