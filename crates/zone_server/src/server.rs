//! The process-wide server context shared by every zone.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::ZoneConfig;
use crate::zone::{Zone, ZoneId};

/// Owns the zones of one process and the cross-zone client aggregate.
///
/// Zones hold only a weak handle back to their server.
#[derive(Debug, Default)]
pub struct Server {
    zones: DashMap<ZoneId, Arc<Zone>>,
    active_clients: AtomicUsize,
}

impl Server {
    /// Create an empty server.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a zone owned by this server. A zone already registered under
    /// the same id is replaced.
    pub fn create_zone(self: &Arc<Self>, id: ZoneId, config: ZoneConfig) -> Arc<Zone> {
        let zone = Zone::attached(id, config, Arc::downgrade(self));
        if self.zones.insert(id, zone.clone()).is_some() {
            warn!(zone = %id, "replaced existing zone");
        }
        info!(zone = %id, session = %zone.session(), "zone created");
        zone
    }

    /// The zone registered under `id`.
    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<Arc<Zone>> {
        self.zones.get(&id).map(|entry| entry.value().clone())
    }

    /// Forget the zone registered under `id`.
    pub fn remove_zone(&self, id: ZoneId) -> Option<Arc<Zone>> {
        self.zones.remove(&id).map(|(_, zone)| zone)
    }

    /// Snapshot of every zone.
    #[must_use]
    pub fn zones(&self) -> Vec<Arc<Zone>> {
        self.zones.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of zones.
    #[must_use]
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Clients across every zone, as of the last recount.
    #[must_use]
    pub fn active_client_count(&self) -> usize {
        self.active_clients.load(Ordering::Acquire)
    }

    /// Overwrite the aggregate client count.
    pub fn set_active_client_count(&self, count: usize) {
        self.active_clients.store(count, Ordering::Release);
    }

    /// Sum the client counts of every zone, store the result and return it.
    pub fn recount_active_clients(&self) -> usize {
        let total = self
            .zones()
            .iter()
            .map(|zone| zone.client_count())
            .sum();
        self.set_active_client_count(total);
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_client;

    #[tokio::test]
    async fn test_recount_sums_every_zone() {
        let server = Server::new();
        let first = server.create_zone(ZoneId::new(1000, 1, 0), ZoneConfig::new());
        let second = server.create_zone(ZoneId::new(1100, 1, 0), ZoneConfig::new());

        for id in [1, 2] {
            let (client, _rx) = test_client(id);
            first.register_client(client).await.unwrap();
        }
        let (client, _rx) = test_client(3);
        second.register_client(client).await.unwrap();

        assert_eq!(server.recount_active_clients(), 3);
        assert_eq!(server.active_client_count(), 3);
    }

    #[tokio::test]
    async fn test_destroyed_zone_leaves_server() {
        let server = Server::new();
        let id = ZoneId::new(1000, 1, 0);
        let zone = server.create_zone(id, ZoneConfig::new());
        let (client, _rx) = test_client(1);
        zone.register_client(client).await.unwrap();
        server.recount_active_clients();

        zone.destroy().await;
        assert!(server.zone(id).is_none());
        assert_eq!(server.zone_count(), 0);
        assert_eq!(server.active_client_count(), 0);
    }

    #[test]
    fn test_zone_holds_weak_server() {
        let server = Server::new();
        let zone = server.create_zone(ZoneId::new(1000, 1, 0), ZoneConfig::new());
        assert!(zone.server().is_some());
        drop(server);
        assert!(zone.server().is_none());
    }
}
