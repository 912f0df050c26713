//! A minimal gameplay layer: props, path spawners and avatars.
//!
//! Every level object becomes a [`Prop`] placeholder. Unless its template is
//! static, the prop spawns one [`PropReplica`] at its position, which is what
//! clients see. Spawner paths become a [`PathSpawner`] that spawns replicas
//! across its waypoints. Joining participants are represented by an
//! [`Avatar`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec3;
use zone_entity::{
    BitWriter, Entity, EntityError, EntityId, EntityIdAllocator, EntityRef, NetworkEntity, Spawner,
};

use crate::content::{LevelObject, SpawnerPath};
use crate::factory::{EntityFactory, Instance};
use crate::zone::Zone;

/// Template of scenery that never spawns anything.
pub const STATIC_TEMPLATE: u32 = 0;

fn write_vec3(out: &mut BitWriter, v: Vec3) {
    out.write_f32(v.x);
    out.write_f32(v.y);
    out.write_f32(v.z);
}

/// Level object placeholder.
#[derive(Debug)]
pub struct Prop {
    id: EntityId,
    template: u32,
    position: Vec3,
    ids: Arc<EntityIdAllocator>,
}

impl Entity for Prop {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        "prop"
    }
}

impl Spawner for Prop {
    fn spawn(&self) -> Result<Vec<EntityRef>, EntityError> {
        let replica = PropReplica::new(self.ids.allocate(), self.template, self.id, self.position);
        Ok(vec![EntityRef::Network(Arc::new(replica))])
    }
}

/// What clients see of a prop.
#[derive(Debug)]
pub struct PropReplica {
    id: EntityId,
    template: u32,
    source: EntityId,
    position: Vec3,
    /// Seconds alive, as `f32` bits.
    age: AtomicU32,
}

impl PropReplica {
    /// A replica of `template` spawned by `source` at `position`.
    #[must_use]
    pub fn new(id: EntityId, template: u32, source: EntityId, position: Vec3) -> Self {
        Self {
            id,
            template,
            source,
            position,
            age: AtomicU32::new(0f32.to_bits()),
        }
    }

    /// Seconds since the replica was spawned, summed from tick deltas.
    #[must_use]
    pub fn age(&self) -> f32 {
        f32::from_bits(self.age.load(Ordering::Acquire))
    }

    /// World position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }
}

impl Entity for PropReplica {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        "prop replica"
    }

    fn update(&self, dt: f32) -> Result<(), EntityError> {
        // Only the tick loop writes the age.
        let aged = self.age() + dt;
        self.age.store(aged.to_bits(), Ordering::Release);
        Ok(())
    }
}

impl NetworkEntity for PropReplica {
    fn write_construct(&self, out: &mut BitWriter) {
        out.write_u32(self.template);
        out.write_u64(self.source.id());
        write_vec3(out, self.position);
    }

    fn write_serialize(&self, out: &mut BitWriter) {
        out.write_f32(self.age());
    }
}

/// Spawns replicas along a spawner path's waypoints.
#[derive(Debug)]
pub struct PathSpawner {
    id: EntityId,
    path: String,
    template: u32,
    max_to_spawn: u32,
    waypoints: Vec<Vec3>,
    ids: Arc<EntityIdAllocator>,
}

impl PathSpawner {
    /// The path this spawner was built from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Entity for PathSpawner {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        "path spawner"
    }

    fn start(&self) -> Result<(), EntityError> {
        if self.max_to_spawn > 0 && self.waypoints.is_empty() {
            return Err(EntityError::Start {
                entity: self.id,
                reason: format!("path `{}` has no waypoints", self.path),
            });
        }
        Ok(())
    }
}

impl Spawner for PathSpawner {
    fn spawn(&self) -> Result<Vec<EntityRef>, EntityError> {
        let products = self
            .waypoints
            .iter()
            .cycle()
            .take(self.max_to_spawn as usize)
            .map(|point| {
                let replica = PropReplica::new(self.ids.allocate(), self.template, self.id, *point);
                EntityRef::Network(Arc::new(replica))
            })
            .collect();
        Ok(products)
    }
}

/// A participant's presence in the zone.
#[derive(Debug)]
pub struct Avatar {
    id: EntityId,
    name: String,
    position: Mutex<Vec3>,
}

impl Avatar {
    /// An avatar standing at the origin.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: Mutex::new(Vec3::ZERO),
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the avatar.
    pub fn set_position(&self, position: Vec3) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }
}

impl Entity for Avatar {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl NetworkEntity for Avatar {
    fn write_construct(&self, out: &mut BitWriter) {
        let name = self.name.as_bytes();
        let len = u16::try_from(name.len()).unwrap_or(u16::MAX);
        out.write_u16(len);
        out.write_bytes(&name[..usize::from(len)]);
        write_vec3(out, self.position());
    }

    fn write_serialize(&self, out: &mut BitWriter) {
        write_vec3(out, self.position());
    }
}

/// Builds [`Prop`]s and [`PathSpawner`]s.
#[derive(Debug, Clone)]
pub struct PropFactory {
    static_templates: HashSet<u32>,
}

impl PropFactory {
    /// A factory where only [`STATIC_TEMPLATE`] is static.
    #[must_use]
    pub fn new() -> Self {
        Self {
            static_templates: HashSet::from([STATIC_TEMPLATE]),
        }
    }

    /// Mark `template` as scenery that never spawns.
    #[must_use]
    pub fn with_static(mut self, template: u32) -> Self {
        self.static_templates.insert(template);
        self
    }
}

impl Default for PropFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityFactory for PropFactory {
    fn instantiate(&self, zone: &Zone, object: &LevelObject) -> Result<Instance, EntityError> {
        let prop = Arc::new(Prop {
            id: EntityId(object.id),
            template: object.template,
            position: object.position,
            ids: zone.id_allocator(),
        });
        if self.static_templates.contains(&object.template) {
            Ok(Instance::inert(prop))
        } else {
            Ok(Instance::spawning(prop.clone(), prop))
        }
    }

    fn instantiate_spawner_path(
        &self,
        zone: &Zone,
        path: &SpawnerPath,
    ) -> Result<Instance, EntityError> {
        let spawner = Arc::new(PathSpawner {
            id: zone.allocate_id(),
            path: path.name.clone(),
            template: path.template,
            max_to_spawn: path.max_to_spawn,
            waypoints: path.waypoints.clone(),
            ids: zone.id_allocator(),
        });
        Ok(Instance::spawning(spawner.clone(), spawner))
    }
}
