//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a plain `u64`. Level objects carry the identifier their
//! content description assigned; entities created at runtime draw fresh ones
//! from the zone's [`EntityIdAllocator`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A zone-wide entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// Shared by reference between the zone and the gameplay factories that
/// create entities at runtime, so allocation goes through an atomic counter.
#[derive(Debug)]
pub struct EntityIdAllocator {
    next_id: AtomicU64,
}

impl EntityIdAllocator {
    /// Creates an allocator whose first ID is `first`. 0 is never handed out.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first.max(1)),
        }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
