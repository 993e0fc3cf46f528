//! Dynamic partition eviction

use folio_storage::CacheStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::worker::{EventHandler, Worker};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Entries in the partition before the sweep
    pub before: usize,
    pub evicted: usize,
    pub failed: usize,
}

/// Trims a partition to a maximum entry count, oldest insertions first
pub struct EvictionSweeper {
    store: CacheStore,
    partition: String,
    max_entries: usize,
}

impl EvictionSweeper {
    pub fn new(store: CacheStore, partition: impl Into<String>, max_entries: usize) -> Self {
        Self {
            store,
            partition: partition.into(),
            max_entries,
        }
    }

    /// Remove the least recently inserted entries above capacity
    ///
    /// Deletions are independent: a failed one is counted and the sweep
    /// moves on.
    pub async fn sweep(&self) -> Result<EvictionReport, CoreError> {
        let entries = self.store.entries(&self.partition).await?;
        let before = entries.len();

        if before <= self.max_entries {
            debug!(
                "{} holds {} of {} entries, nothing to evict",
                self.partition, before, self.max_entries
            );
            return Ok(EvictionReport {
                before,
                ..EvictionReport::default()
            });
        }

        let excess = before - self.max_entries;
        info!(
            "{} holds {} entries (max {}), evicting {}",
            self.partition, before, self.max_entries, excess
        );

        let mut report = EvictionReport {
            before,
            ..EvictionReport::default()
        };

        for entry in entries.iter().take(excess) {
            match self.store.delete_key(&self.partition, &entry.key).await {
                Ok(_) => report.evicted += 1,
                Err(e) => {
                    warn!("Failed to evict {} from {}: {}", entry.key, self.partition, e);
                    report.failed += 1;
                }
            }
        }

        metrics::counter!("folio_evicted_entries_total").increment(report.evicted as u64);
        info!(
            "Evicted {} entries from {} ({} failed)",
            report.evicted, self.partition, report.failed
        );

        Ok(report)
    }
}

/// Spawn a background task that delivers an eviction tick periodically
pub fn spawn_eviction_task(
    worker: Arc<Worker>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    use tokio::time::interval as ticker_interval;

    info!(
        "Starting background eviction task (interval: {} hours)",
        interval.as_secs() / 3600
    );

    tokio::spawn(async move {
        let mut ticker = ticker_interval(interval);

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;
            info!("Running scheduled eviction sweep");

            match worker.on_eviction_tick().await {
                Ok(report) => {
                    if report.evicted > 0 {
                        info!("Scheduled sweep evicted {} entries", report.evicted);
                    }
                }
                Err(e) => {
                    warn!("Error during scheduled eviction: {}", e);
                }
            }
        }
    })
}
