//! Host clients (open pages) and which of them the worker controls

use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::debug;

/// Upper bound on client ids remembered per set
pub const MAX_TRACKED_CLIENTS: usize = 4096;

#[derive(Debug, Default)]
struct Clients {
    uncontrolled: HashSet<String>,
    controlled: HashSet<String>,
}

/// Tracks host clients by id
///
/// A client first seen while the worker is active is controlled from the
/// start. Clients seen earlier stay uncontrolled until [`claim`] runs.
/// Client ids come from request headers, so each set keeps at most
/// [`MAX_TRACKED_CLIENTS`] ids; a client that was not recorded is judged
/// by the worker state alone.
///
/// [`claim`]: ClientRegistry::claim
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<Clients>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client if new and report whether it is controlled
    pub fn observe(&self, client_id: &str, worker_active: bool) -> bool {
        {
            let clients = self.clients.read();
            if clients.controlled.contains(client_id) {
                return true;
            }
            if clients.uncontrolled.contains(client_id) {
                return false;
            }
        }

        let mut clients = self.clients.write();
        let set = if worker_active {
            &mut clients.controlled
        } else {
            &mut clients.uncontrolled
        };
        if set.len() < MAX_TRACKED_CLIENTS && set.insert(client_id.to_string()) {
            debug!("Client {} registered (controlled: {})", client_id, worker_active);
        }
        worker_active
    }

    /// Take control of every known client; returns how many changed hands
    pub fn claim(&self) -> usize {
        let mut clients = self.clients.write();
        let pending = std::mem::take(&mut clients.uncontrolled);
        let claimed = pending.len();

        let room = MAX_TRACKED_CLIENTS.saturating_sub(clients.controlled.len());
        clients.controlled.extend(pending.into_iter().take(room));
        claimed
    }

    pub fn is_controlled(&self, client_id: &str) -> bool {
        self.clients.read().controlled.contains(client_id)
    }

    pub fn controlled_count(&self) -> usize {
        self.clients.read().controlled.len()
    }

    pub fn uncontrolled_count(&self) -> usize {
        self.clients.read().uncontrolled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_takes_over_existing_clients() {
        let registry = ClientRegistry::new();
        assert!(!registry.observe("tab-1", false));
        assert!(!registry.observe("tab-2", false));
        assert_eq!(registry.controlled_count(), 0);
        assert_eq!(registry.uncontrolled_count(), 2);

        assert_eq!(registry.claim(), 2);
        assert!(registry.is_controlled("tab-1"));
        assert!(registry.observe("tab-2", true));
        assert_eq!(registry.uncontrolled_count(), 0);
        assert_eq!(registry.claim(), 0);
    }

    #[test]
    fn test_new_client_after_activation_is_controlled() {
        let registry = ClientRegistry::new();
        assert!(registry.observe("tab-3", true));
        assert!(!registry.is_controlled("unknown"));
        assert_eq!(registry.controlled_count(), 1);
    }

    #[test]
    fn test_tracking_is_bounded() {
        let registry = ClientRegistry::new();
        for i in 0..MAX_TRACKED_CLIENTS + 500 {
            assert!(registry.observe(&format!("tab-{}", i), true));
        }
        assert_eq!(registry.controlled_count(), MAX_TRACKED_CLIENTS);

        let early = ClientRegistry::new();
        for i in 0..MAX_TRACKED_CLIENTS + 500 {
            assert!(!early.observe(&format!("early-{}", i), false));
        }
        assert_eq!(early.uncontrolled_count(), MAX_TRACKED_CLIENTS);
        assert_eq!(early.claim(), MAX_TRACKED_CLIENTS);
        assert_eq!(early.controlled_count(), MAX_TRACKED_CLIENTS);
    }
}
