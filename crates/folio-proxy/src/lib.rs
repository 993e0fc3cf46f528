//! Folio Cache Network Layer
//!
//! This crate provides the network capability consumed by the worker:
//! the [`Fetcher`] trait and an HTTP implementation built on `reqwest`.

pub mod client;
pub mod error;
pub mod fetcher;

pub use client::{HttpFetcher, HttpFetcherConfig};
pub use error::ProxyError;
pub use fetcher::Fetcher;
