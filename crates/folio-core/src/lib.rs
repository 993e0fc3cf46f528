//! Folio Cache Core Business Logic
//!
//! This crate provides the request interception and caching engine for the
//! offline reader: asset classification, the fetch strategies, the worker
//! lifecycle (install, activate, control messages) and dynamic cache
//! eviction, coordinated by [`Worker`].

pub mod classify;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod eviction;
pub mod lifecycle;
pub mod message;
pub mod offline;
pub mod strategy;
pub mod worker;

pub use classify::{AssetClass, Classifier};
pub use clients::ClientRegistry;
pub use config::WorkerConfig;
pub use error::CoreError;
pub use event::ExtendableEvent;
pub use eviction::{EvictionReport, EvictionSweeper, spawn_eviction_task};
pub use lifecycle::{ActivationReport, LifecycleManager, WorkerState};
pub use message::ControlMessage;
pub use strategy::{Strategy, StrategyEngine};
pub use worker::{EventHandler, FetchOutcome, Worker};

#[cfg(test)]
pub(crate) mod testing;
