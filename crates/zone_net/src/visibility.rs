//! Per-client visibility and network-id mapping.
//!
//! A [`Visibility`] belongs to exactly one client. It decides whether and
//! when that client may see an entity, and owns the mapping from entity to
//! the [`NetworkId`] the client knows it by. The replication protocol never
//! invents ids; it only asks.

use std::sync::Mutex;

use dashmap::DashMap;
use tracing::warn;
use zone_entity::EntityId;

use crate::frame::NetworkId;

/// Invoked with the granted id once an entity becomes visible.
pub type GrantCallback = Box<dyn FnOnce(NetworkId) + Send + 'static>;

/// One client's view of the zone.
pub trait Visibility: Send + Sync {
    /// Ask for `entity` to become visible. `on_granted` runs when (and if) an
    /// id is granted. That may happen before this call returns, much later
    /// from another task, or never.
    fn reveal(&self, entity: EntityId, on_granted: GrantCallback);

    /// The id already granted for `entity`, if any.
    fn try_get_id(&self, entity: EntityId) -> Option<NetworkId>;

    /// Drop the mapping for `entity`. Its id may be handed out again.
    fn forget(&self, entity: EntityId);
}

/// Grants every reveal immediately.
///
/// Ids come from a `u16` pool starting at 1; forgotten ids are recycled.
/// Revealing an entity that already has an id grants nothing, so a client
/// never receives a second construction for a replica it already has.
#[derive(Debug)]
pub struct ImmediateVisibility {
    ids: DashMap<EntityId, NetworkId>,
    pool: Mutex<IdPool>,
}

#[derive(Debug)]
struct IdPool {
    next: u32,
    free: Vec<u16>,
}

impl IdPool {
    fn acquire(&mut self) -> Option<u16> {
        if let Some(id) = self.free.pop() {
            return Some(id);
        }
        let id = u16::try_from(self.next).ok()?;
        self.next += 1;
        Some(id)
    }

    fn release(&mut self, id: u16) {
        self.free.push(id);
    }
}

impl ImmediateVisibility {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            pool: Mutex::new(IdPool {
                next: 1,
                free: Vec::new(),
            }),
        }
    }

    /// Number of entities currently visible.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn pool(&self) -> std::sync::MutexGuard<'_, IdPool> {
        self.pool
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ImmediateVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl Visibility for ImmediateVisibility {
    fn reveal(&self, entity: EntityId, on_granted: GrantCallback) {
        let granted = match self.ids.entry(entity) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let Some(raw) = self.pool().acquire() else {
                    warn!(%entity, "network id pool exhausted");
                    return;
                };
                let id = NetworkId(raw);
                slot.insert(id);
                Some(id)
            }
        };
        // The entry guard is released before the callback runs, so the
        // callback may query this mapping.
        if let Some(id) = granted {
            on_granted(id);
        }
    }

    fn try_get_id(&self, entity: EntityId) -> Option<NetworkId> {
        self.ids.get(&entity).map(|id| *id)
    }

    fn forget(&self, entity: EntityId) {
        if let Some((_, id)) = self.ids.remove(&entity) {
            self.pool().release(id.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU16, Ordering};

    use super::*;

    fn record() -> (Arc<AtomicU16>, GrantCallback) {
        let seen = Arc::new(AtomicU16::new(0));
        let sink = seen.clone();
        (seen, Box::new(move |id: NetworkId| sink.store(id.0, Ordering::SeqCst)))
    }

    #[test]
    fn test_reveal_grants_synchronously() {
        let vis = ImmediateVisibility::new();
        let (seen, cb) = record();
        vis.reveal(EntityId(10), cb);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(vis.try_get_id(EntityId(10)), Some(NetworkId(1)));
    }

    #[test]
    fn test_second_reveal_grants_nothing() {
        let vis = ImmediateVisibility::new();
        let (_, first) = record();
        vis.reveal(EntityId(10), first);
        let (seen, second) = record();
        vis.reveal(EntityId(10), second);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(vis.len(), 1);
    }

    #[test]
    fn test_forget_recycles_id() {
        let vis = ImmediateVisibility::new();
        vis.reveal(EntityId(1), Box::new(|_| {}));
        vis.reveal(EntityId(2), Box::new(|_| {}));
        vis.forget(EntityId(1));
        assert_eq!(vis.try_get_id(EntityId(1)), None);

        let (seen, cb) = record();
        vis.reveal(EntityId(3), cb);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forget_unknown_is_noop() {
        let vis = ImmediateVisibility::new();
        vis.forget(EntityId(5));
        assert!(vis.is_empty());
    }
}
