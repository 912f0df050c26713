//! Test fixtures shared across modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::mpsc::UnboundedReceiver;
use zone_entity::{BitWriter, Entity, EntityError, EntityId, EntityRef, NetworkEntity, Spawner};
use zone_net::{
    ChannelTransport, FrameHeader, GrantCallback, ImmediateVisibility, NetworkId, Visibility,
};

use crate::client::Client;
use crate::config::ZoneConfig;
use crate::content::{LevelObject, SpawnerPath};
use crate::factory::{EntityFactory, Instance};
use crate::props::PropFactory;
use crate::script::{ScriptError, ScriptHost};
use crate::zone::{Zone, ZoneId};

/// A zone on its own, outside any server.
pub(crate) fn test_zone(config: ZoneConfig) -> Arc<Zone> {
    Zone::new(ZoneId::new(1000, 1, 0), config)
}

/// Counts its updates.
pub(crate) struct Counter {
    id: EntityId,
    updates: AtomicU64,
    last_dt: AtomicU32,
}

impl Counter {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId(id),
            updates: AtomicU64::new(0),
            last_dt: AtomicU32::new(0),
        })
    }

    pub(crate) fn updates(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    pub(crate) fn last_dt(&self) -> f32 {
        f32::from_bits(self.last_dt.load(Ordering::SeqCst))
    }
}

impl Entity for Counter {
    fn id(&self) -> EntityId {
        self.id
    }

    fn update(&self, dt: f32) -> Result<(), EntityError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.last_dt.store(dt.to_bits(), Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every update.
pub(crate) struct Faulty(EntityId);

impl Faulty {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self(EntityId(id)))
    }
}

impl Entity for Faulty {
    fn id(&self) -> EntityId {
        self.0
    }

    fn update(&self, _dt: f32) -> Result<(), EntityError> {
        Err(EntityError::Update {
            entity: self.0,
            reason: "always fails".into(),
        })
    }
}

/// Panics on every update.
pub(crate) struct Panicky(EntityId);

impl Panicky {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self(EntityId(id)))
    }
}

impl Entity for Panicky {
    fn id(&self) -> EntityId {
        self.0
    }

    fn update(&self, _dt: f32) -> Result<(), EntityError> {
        panic!("entity {} blew up", self.0);
    }
}

/// A network entity whose payloads are one byte: the low byte of its id.
pub(crate) struct Replica {
    id: EntityId,
}

impl Replica {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self { id: EntityId(id) })
    }
}

impl Entity for Replica {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl NetworkEntity for Replica {
    fn write_construct(&self, out: &mut BitWriter) {
        out.write_u8(self.id.id().to_le_bytes()[0]);
    }

    fn write_serialize(&self, out: &mut BitWriter) {
        out.write_u8(self.id.id().to_le_bytes()[0]);
    }
}

/// A client with an immediate-grant visibility and a channel transport.
pub(crate) fn test_client(id: u64) -> (Arc<Client>, UnboundedReceiver<Vec<u8>>) {
    client_with(id, Arc::new(ImmediateVisibility::new()))
}

/// A client with the given visibility and a channel transport.
pub(crate) fn client_with(
    id: u64,
    visibility: Arc<dyn Visibility>,
) -> (Arc<Client>, UnboundedReceiver<Vec<u8>>) {
    let (transport, rx) = ChannelTransport::pair();
    let client = Client::new(Replica::new(id), visibility, Arc::new(transport));
    (Arc::new(client), rx)
}

/// Parse the header of every frame received so far.
pub(crate) fn drain_frames(rx: &mut UnboundedReceiver<Vec<u8>>) -> Vec<FrameHeader> {
    let mut headers = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        headers.push(FrameHeader::parse(&frame).unwrap());
    }
    headers
}

/// Holds every reveal until [`DeferredVisibility::grant_all`].
pub(crate) struct DeferredVisibility {
    pending: Mutex<Vec<(EntityId, GrantCallback)>>,
    ids: Mutex<HashMap<EntityId, NetworkId>>,
    next: AtomicU16,
}

impl DeferredVisibility {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            ids: Mutex::new(HashMap::new()),
            next: AtomicU16::new(1),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Grant every pending reveal. Returns how many were granted.
    pub(crate) fn grant_all(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        let granted = pending.len();
        for (entity, on_granted) in pending {
            let id = NetworkId(self.next.fetch_add(1, Ordering::SeqCst));
            self.ids.lock().unwrap().insert(entity, id);
            on_granted(id);
        }
        granted
    }
}

impl Visibility for DeferredVisibility {
    fn reveal(&self, entity: EntityId, on_granted: GrantCallback) {
        self.pending.lock().unwrap().push((entity, on_granted));
    }

    fn try_get_id(&self, entity: EntityId) -> Option<NetworkId> {
        self.ids.lock().unwrap().get(&entity).copied()
    }

    fn forget(&self, entity: EntityId) {
        self.ids.lock().unwrap().remove(&entity);
    }
}

/// Placeholder whose start fails.
struct BadStart(EntityId);

impl Entity for BadStart {
    fn id(&self) -> EntityId {
        self.0
    }

    fn start(&self) -> Result<(), EntityError> {
        Err(EntityError::Start {
            entity: self.0,
            reason: "refuses to start".into(),
        })
    }
}

/// Placeholder whose spawn fails.
struct BadSpawn(EntityId);

impl Entity for BadSpawn {
    fn id(&self) -> EntityId {
        self.0
    }
}

impl Spawner for BadSpawn {
    fn spawn(&self) -> Result<Vec<EntityRef>, EntityError> {
        Err(EntityError::Spawn {
            entity: self.0,
            reason: "nothing to spawn".into(),
        })
    }
}

/// A [`PropFactory`] with a few templates that fail on purpose.
#[derive(Default)]
pub(crate) struct TestFactory {
    props: PropFactory,
}

impl TestFactory {
    pub(crate) const UNKNOWN: u32 = 9001;
    pub(crate) const BAD_START: u32 = 9002;
    pub(crate) const BAD_SPAWN: u32 = 9003;
}

impl EntityFactory for TestFactory {
    fn instantiate(&self, zone: &Zone, object: &LevelObject) -> Result<Instance, EntityError> {
        let id = EntityId(object.id);
        match object.template {
            Self::UNKNOWN => Err(EntityError::UnknownTemplate(object.template)),
            Self::BAD_START => Ok(Instance::spawning(
                Arc::new(BadStart(id)),
                Arc::new(BadSpawn(id)),
            )),
            Self::BAD_SPAWN => {
                let entity = Arc::new(BadSpawn(id));
                Ok(Instance::spawning(entity.clone(), entity))
            }
            _ => self.props.instantiate(zone, object),
        }
    }

    fn instantiate_spawner_path(
        &self,
        zone: &Zone,
        path: &SpawnerPath,
    ) -> Result<Instance, EntityError> {
        if path.template == 0 {
            return Ok(Instance::inert(Arc::new(BadSpawn(zone.allocate_id()))));
        }
        self.props.instantiate_spawner_path(zone, path)
    }
}

/// A script host that always fails.
pub(crate) struct FailingScripts;

impl ScriptHost for FailingScripts {
    fn load_scripts<'a>(&'a self, _zone: &'a Zone) -> BoxFuture<'a, Result<(), ScriptError>> {
        Box::pin(async {
            Err(ScriptError {
                script: "zone_init".into(),
                reason: "syntax error".into(),
            })
        })
    }
}
