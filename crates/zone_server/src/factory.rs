//! Gameplay entity construction.

use std::sync::Arc;

use zone_entity::{Entity, EntityError, Spawner};

use crate::content::{LevelObject, SpawnerPath};
use crate::zone::Zone;

/// A freshly built placeholder and the capabilities it was built with.
///
/// The spawn capability is decided here, once, rather than probed for later.
#[derive(Clone)]
pub struct Instance {
    /// The placeholder entity, registered in the zone but never replicated.
    pub entity: Arc<dyn Entity>,
    /// What the placeholder turns into, if it spawns anything.
    pub spawner: Option<Arc<dyn Spawner>>,
}

impl Instance {
    /// A placeholder that never spawns.
    #[must_use]
    pub fn inert(entity: Arc<dyn Entity>) -> Self {
        Self {
            entity,
            spawner: None,
        }
    }

    /// A placeholder with a spawn capability.
    #[must_use]
    pub fn spawning(entity: Arc<dyn Entity>, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            entity,
            spawner: Some(spawner),
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("entity", &self.entity.id())
            .field("spawns", &self.spawner.is_some())
            .finish()
    }
}

/// Builds entities from content descriptors.
pub trait EntityFactory: Send + Sync {
    /// Build the placeholder for a level object.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if the object cannot be built, typically
    /// [`EntityError::UnknownTemplate`].
    fn instantiate(&self, zone: &Zone, object: &LevelObject) -> Result<Instance, EntityError>;

    /// Build the spawner entity for a spawner path.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if the path cannot be built.
    fn instantiate_spawner_path(
        &self,
        zone: &Zone,
        path: &SpawnerPath,
    ) -> Result<Instance, EntityError>;
}
