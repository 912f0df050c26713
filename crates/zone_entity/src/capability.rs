//! Capability interfaces the zone runtime dispatches through.
//!
//! Gameplay code implements these traits; the zone only ever talks to an
//! entity through them. Which capabilities an entity has is decided once,
//! when the gameplay factory builds it, and carried alongside the entity
//! instead of being queried again on every use.
//!
//! Methods take `&self`: entities are shared between the zone registry, the
//! tick loop and gameplay code, so mutable state lives behind interior
//! mutability inside the implementation.

use std::sync::Arc;

use crate::bitstream::BitWriter;
use crate::entity::EntityId;

/// Errors raised by entity implementations.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// The factory has no definition for the requested template.
    #[error("unknown template {0}")]
    UnknownTemplate(u32),

    /// The entity could not be started.
    #[error("{entity} failed to start: {reason}")]
    Start {
        /// The failing entity.
        entity: EntityId,
        /// Human-readable cause.
        reason: String,
    },

    /// A per-tick update failed.
    #[error("{entity} update failed: {reason}")]
    Update {
        /// The failing entity.
        entity: EntityId,
        /// Human-readable cause.
        reason: String,
    },

    /// A spawn operation failed.
    #[error("{entity} spawn failed: {reason}")]
    Spawn {
        /// The spawning entity.
        entity: EntityId,
        /// Human-readable cause.
        reason: String,
    },

    /// The entity lacks a capability the caller requires.
    #[error("{entity} has no {capability} capability")]
    MissingCapability {
        /// The entity that was asked.
        entity: EntityId,
        /// Name of the missing capability.
        capability: &'static str,
    },
}

/// A unit tracked by a zone.
pub trait Entity: Send + Sync + 'static {
    /// The entity's zone-wide identifier.
    fn id(&self) -> EntityId;

    /// Short name used in log output.
    fn name(&self) -> &str {
        "entity"
    }

    /// Called once after the entity has been registered.
    fn start(&self) -> Result<(), EntityError> {
        Ok(())
    }

    /// Called once per tick. `dt` is the previous tick's duration in seconds.
    fn update(&self, _dt: f32) -> Result<(), EntityError> {
        Ok(())
    }
}

/// An entity that can be represented to clients.
///
/// Both writers must make a single forward pass over `out` and produce the
/// same number of bits for the same state. They are infallible: a writer
/// that cannot encode its state is a bug in the writer.
pub trait NetworkEntity: Entity {
    /// Write the full state a client needs to create its replica.
    fn write_construct(&self, out: &mut BitWriter);

    /// Write the incremental state update for an existing replica.
    fn write_serialize(&self, out: &mut BitWriter);
}

/// The spawn capability: turns a placeholder (a level object, a spawner path)
/// into the entities that actually live in the zone.
pub trait Spawner: Send + Sync + 'static {
    /// Produce the spawned entities.
    fn spawn(&self) -> Result<Vec<EntityRef>, EntityError>;
}

/// A shared handle to an entity, tagged with whether it replicates.
#[derive(Clone)]
pub enum EntityRef {
    /// Server-side only.
    Local(Arc<dyn Entity>),
    /// Eligible for replication.
    Network(Arc<dyn NetworkEntity>),
}

impl EntityRef {
    /// The referenced entity's identifier.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Local(entity) => entity.id(),
            Self::Network(entity) => entity.id(),
        }
    }

    /// The referenced entity's log name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Local(entity) => entity.name(),
            Self::Network(entity) => entity.name(),
        }
    }

    /// Start the referenced entity.
    ///
    /// # Errors
    ///
    /// Propagates the entity's own start failure.
    pub fn start(&self) -> Result<(), EntityError> {
        match self {
            Self::Local(entity) => entity.start(),
            Self::Network(entity) => entity.start(),
        }
    }

    /// Returns the network capability, if the entity has one.
    #[must_use]
    pub fn as_network(&self) -> Option<&Arc<dyn NetworkEntity>> {
        match self {
            Self::Local(_) => None,
            Self::Network(entity) => Some(entity),
        }
    }
}

impl std::fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Local(_) => "Local",
            Self::Network(_) => "Network",
        };
        f.debug_struct("EntityRef")
            .field("kind", &tag)
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
