//! Lifetime extension for event handlers

use std::future::Future;
use tokio_util::task::TaskTracker;

/// Scope of one dispatched event
///
/// Work registered with [`ExtendableEvent::wait_until`] runs in the
/// background, and the event is finished only once [`settled`] has
/// observed all of it complete. Cache writes issued after a response was
/// already handed back are registered here.
///
/// [`settled`]: ExtendableEvent::settled
#[derive(Clone, Default)]
pub struct ExtendableEvent {
    tracker: TaskTracker,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the event's lifetime until `work` completes
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(work);
    }

    /// Number of registered tasks that have not completed
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every registered task; no more work may be added afterwards
    pub async fn settled(self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settled_waits_for_all_work() {
        let event = ExtendableEvent::new();
        let done = Arc::new(AtomicUsize::new(0));

        for delay in [30u64, 10, 20] {
            let done = done.clone();
            event.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        event.settled().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_settled_without_work() {
        let event = ExtendableEvent::new();
        assert_eq!(event.pending(), 0);
        event.settled().await;
    }
}
