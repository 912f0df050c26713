//! Zone initialization.
//!
//! Runs once per zone, in order:
//!
//! 1. Every level object of every scene is built, registered and started.
//!    Objects flagged server-only, tool-only or render-disabled, and objects
//!    without a spawn capability, stay server-side. The others spawn, and
//!    the spawn products are what clients get to see.
//! 2. Every spawner path is built, registered, started and spawned.
//! 3. The script host loads.
//! 4. The zone is marked loaded and its scheduler started.
//!
//! A failing object or path is logged and skipped. A failing script load
//! aborts initialization.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zone_entity::{EntityError, Spawner};

use crate::content::{ContentDescription, LevelObject, SpawnerPath};
use crate::error::ZoneError;
use crate::factory::{EntityFactory, Instance};
use crate::script::ScriptHost;
use crate::tick::SchedulerHandle;
use crate::zone::Zone;

impl Zone {
    /// Populate the zone from `content`, load scripts, mark the zone loaded
    /// and start its scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::ScriptLoad`] if the script host fails, and any
    /// error [`Zone::start`] returns. Per-object failures are not errors.
    pub async fn initialize(
        self: &Arc<Self>,
        content: &ContentDescription,
        factory: &dyn EntityFactory,
        scripts: &dyn ScriptHost,
    ) -> Result<SchedulerHandle, ZoneError> {
        info!(
            zone = %self.id(),
            session = %self.session(),
            scenes = content.scenes.len(),
            paths = content.paths.len(),
            "initializing zone"
        );

        let mut loaded = 0usize;
        let mut skipped = 0usize;

        for object in content.level_objects() {
            match self.load_level_object(factory, object) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    skipped += 1;
                    warn!(zone = %self.id(), object = object.id, error = %e, "level object skipped");
                }
            }
        }

        for path in content.spawner_paths() {
            match self.load_spawner_path(factory, path) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    skipped += 1;
                    warn!(zone = %self.id(), path = %path.name, error = %e, "spawner path skipped");
                }
            }
        }

        scripts.load_scripts(self).await?;

        self.set_loaded();
        info!(
            zone = %self.id(),
            loaded,
            skipped,
            entities = self.entity_count(),
            "zone loaded"
        );

        self.start().await
    }

    fn load_level_object(
        &self,
        factory: &dyn EntityFactory,
        object: &LevelObject,
    ) -> Result<(), ZoneError> {
        let subject = format!("level object {}", object.id);
        let instance = factory
            .instantiate(self, object)
            .map_err(|source| instantiation(&subject, source))?;

        let spawner = if object.settings.hides_replica() {
            debug!(zone = %self.id(), object = object.id, "object hidden by settings");
            None
        } else {
            instance.spawner.clone()
        };
        self.place(&subject, &instance)?;

        if let Some(spawner) = spawner {
            self.spawn_products(&subject, &*spawner)?;
        }
        Ok(())
    }

    fn load_spawner_path(
        &self,
        factory: &dyn EntityFactory,
        path: &SpawnerPath,
    ) -> Result<(), ZoneError> {
        let subject = format!("spawner path {}", path.name);
        let instance = factory
            .instantiate_spawner_path(self, path)
            .map_err(|source| instantiation(&subject, source))?;

        let Some(spawner) = instance.spawner.clone() else {
            return Err(instantiation(
                &subject,
                EntityError::MissingCapability {
                    entity: instance.entity.id(),
                    capability: "spawn",
                },
            ));
        };
        self.place(&subject, &instance)?;
        self.spawn_products(&subject, &*spawner)
    }

    /// Register and start a placeholder. It is unregistered again if it
    /// fails to start.
    fn place(&self, subject: &str, instance: &Instance) -> Result<(), ZoneError> {
        let entity = instance.entity.clone();
        let id = entity.id();
        self.register(entity.clone())?;
        if let Err(source) = entity.start() {
            self.unregister(id);
            return Err(instantiation(subject, source));
        }
        Ok(())
    }

    fn spawn_products(&self, subject: &str, spawner: &dyn Spawner) -> Result<(), ZoneError> {
        let products = spawner
            .spawn()
            .map_err(|source| instantiation(subject, source))?;
        for product in products {
            self.spawn(product)?;
        }
        Ok(())
    }
}

fn instantiation(subject: &str, source: EntityError) -> ZoneError {
    ZoneError::Instantiation {
        subject: subject.to_string(),
        source,
    }
}
