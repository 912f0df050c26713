//! A zone: one partition of the simulated world.
//!
//! The zone owns its [`EntityRegistry`] behind a single reader-writer lock.
//! Every mutation (registration, removal, spawns) takes the write side;
//! the tick loop and replication take the read side only long enough to
//! snapshot the handles they need, and never call into entity code while
//! holding it.
//!
//! Zone-wide replication (the `*_to_all` helpers and the join sweep) is
//! serialized by a separate fan-out lock, taken before the registry lock. A
//! joining client is held out of [`Zone::clients`] until its join sweep is
//! sent, so the sweep is the first replication traffic it receives.
//!
//! Lifecycle: `NotStarted -> Running -> Stopped`. [`Zone::destroy`] is the
//! only way out of `Running` apart from a scheduler fault, and `Stopped` is
//! terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;
use zone_entity::{Entity, EntityId, EntityIdAllocator, EntityRef, NetworkEntity};

use crate::client::Client;
use crate::config::ZoneConfig;
use crate::error::ZoneError;
use crate::hooks::Listeners;
use crate::registry::{EntityKind, EntityRegistry, Member};
use crate::replication;
use crate::server::Server;
use crate::tick::{self, SchedulerHandle, TickStats};

/// First identifier handed out by a zone's runtime allocator. Identifiers
/// below it belong to content (level objects) and clients.
pub const RUNTIME_ID_BASE: u64 = 1 << 32;

/// Identity of a zone instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId {
    /// Which world map this zone runs.
    pub zone_type: u32,
    /// Instance of that map.
    pub instance: u32,
    /// Clone of that instance.
    pub clone: u32,
}

impl ZoneId {
    /// Create a zone identity.
    #[must_use]
    pub const fn new(zone_type: u32, instance: u32, clone: u32) -> Self {
        Self {
            zone_type,
            instance,
            clone,
        }
    }

    /// The dotted key used in NATS subjects (`type.instance.clone`).
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.zone_type, self.instance, self.clone)
    }
}

/// Where a zone is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    /// Created, scheduler not yet started.
    NotStarted,
    /// Scheduler running.
    Running,
    /// Destroyed or faulted. Terminal.
    Stopped,
}

/// One running partition of the world.
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    session: Uuid,
    config: ZoneConfig,
    registry: RwLock<EntityRegistry>,
    fan_out: Mutex<()>,
    ids: Arc<EntityIdAllocator>,
    loaded: AtomicBool,
    state: watch::Sender<ZoneState>,
    stats: TickStats,
    server: Weak<Server>,
    on_join: Listeners<Arc<Client>>,
    on_start: Listeners<ZoneId>,
    on_destroyed: Listeners<ZoneId>,
}

impl Zone {
    /// Create a zone that belongs to no server.
    #[must_use]
    pub fn new(id: ZoneId, config: ZoneConfig) -> Arc<Self> {
        Self::attached(id, config, Weak::new())
    }

    pub(crate) fn attached(id: ZoneId, config: ZoneConfig, server: Weak<Server>) -> Arc<Self> {
        let (state, _) = watch::channel(ZoneState::NotStarted);
        Arc::new(Self {
            id,
            session: Uuid::new_v4(),
            config,
            registry: RwLock::new(EntityRegistry::new()),
            fan_out: Mutex::new(()),
            ids: Arc::new(EntityIdAllocator::starting_at(RUNTIME_ID_BASE)),
            loaded: AtomicBool::new(false),
            state,
            stats: TickStats::default(),
            server,
            on_join: Listeners::new(),
            on_start: Listeners::new(),
            on_destroyed: Listeners::new(),
        })
    }

    /// The zone's identity.
    #[must_use]
    pub fn id(&self) -> ZoneId {
        self.id
    }

    /// Unique identifier of this zone's lifetime, for correlating logs.
    #[must_use]
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// The zone's configuration.
    #[must_use]
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Tick counters.
    #[must_use]
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// The owning server, if it is still alive.
    #[must_use]
    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.upgrade()
    }

    /// Allocate a runtime entity identifier.
    #[must_use]
    pub fn allocate_id(&self) -> EntityId {
        self.ids.allocate()
    }

    /// The shared runtime identifier allocator, for entities that spawn
    /// long after they were built.
    #[must_use]
    pub fn id_allocator(&self) -> Arc<EntityIdAllocator> {
        self.ids.clone()
    }

    // -- lifecycle -----------------------------------------------------------

    /// Returns `true` once initialization has populated the zone.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub(crate) fn set_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ZoneState {
        *self.state.borrow()
    }

    /// Returns `true` while the scheduler should keep running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ZoneState::Running
    }

    /// Resolves once the zone is stopped.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail while we wait.
        let _ = rx.wait_for(|state| *state == ZoneState::Stopped).await;
    }

    /// Listeners run, in order, each time a client registers.
    #[must_use]
    pub fn on_join(&self) -> &Listeners<Arc<Client>> {
        &self.on_join
    }

    /// Listeners run once when the scheduler starts.
    #[must_use]
    pub fn on_start(&self) -> &Listeners<ZoneId> {
        &self.on_start
    }

    /// Listeners run once when the zone is destroyed.
    #[must_use]
    pub fn on_destroyed(&self) -> &Listeners<ZoneId> {
        &self.on_destroyed
    }

    /// Move to `Running`, run the start listeners and spawn the supervised
    /// scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::InvalidConfig`] for an unusable tick config,
    /// [`ZoneError::AlreadyStarted`] if the zone is running, and
    /// [`ZoneError::Destroyed`] if it has been stopped.
    pub async fn start(self: &Arc<Self>) -> Result<SchedulerHandle, ZoneError> {
        self.config.validate()?;

        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match *state {
            ZoneState::NotStarted => {
                *state = ZoneState::Running;
                true
            }
            ZoneState::Running => {
                outcome = Err(ZoneError::AlreadyStarted);
                false
            }
            ZoneState::Stopped => {
                outcome = Err(ZoneError::Destroyed);
                false
            }
        });
        outcome?;

        info!(zone = %self.id, session = %self.session, "zone started");
        self.on_start.emit(self.id).await;
        Ok(tick::spawn(self.clone()))
    }

    /// Stop the zone for good: the scheduler winds down, destroy listeners
    /// run, and the owning server forgets the zone.
    ///
    /// Destroying a stopped zone does nothing.
    pub async fn destroy(&self) {
        if !self.mark_stopped() {
            return;
        }
        info!(
            zone = %self.id,
            session = %self.session,
            ticks = self.stats.total_ticks(),
            "zone destroyed"
        );
        self.on_destroyed.emit(self.id).await;
        self.leave_server();
    }

    /// Drop out of the owning server and refresh its client aggregate.
    pub(crate) fn leave_server(&self) {
        if let Some(server) = self.server() {
            server.remove_zone(self.id);
            server.recount_active_clients();
        }
    }

    /// Move to `Stopped`. Returns `false` if the zone already was.
    pub(crate) fn mark_stopped(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ZoneState::Stopped {
                false
            } else {
                *state = ZoneState::Stopped;
                true
            }
        })
    }

    // -- registry ------------------------------------------------------------

    fn read(&self) -> RwLockReadGuard<'_, EntityRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_fan_out(&self) -> MutexGuard<'_, ()> {
        self.fan_out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a server-side entity.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken.
    pub fn register(&self, entity: Arc<dyn Entity>) -> Result<(), ZoneError> {
        let id = entity.id();
        self.write().register(entity)?;
        debug!(zone = %self.id, entity = %id, "registered entity");
        Ok(())
    }

    /// Register an entity eligible for replication. Nothing is sent; see
    /// [`Zone::spawn`] for register-and-construct.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken.
    pub fn register_network(&self, entity: Arc<dyn NetworkEntity>) -> Result<(), ZoneError> {
        let id = entity.id();
        self.write().register_network(entity)?;
        debug!(zone = %self.id, entity = %id, "registered network entity");
        Ok(())
    }

    /// Register a connected client.
    ///
    /// The client joins as a member but receives no zone-wide traffic while
    /// the join listeners run, in order, each awaited. It is then sent a
    /// construction for every network entity currently in the zone except
    /// its own avatar, and only after that becomes one of [`Zone::clients`].
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken.
    pub async fn register_client(&self, client: Arc<Client>) -> Result<(), ZoneError> {
        let id = client.id();
        self.write().register_joining(client.clone())?;
        info!(zone = %self.id, client = %id, "client registered");

        self.on_join.emit(client.clone()).await;

        let _fan_out = self.lock_fan_out();
        let visible: Vec<Arc<dyn NetworkEntity>> = {
            let mut registry = self.write();
            if !registry.finish_join(id) {
                debug!(zone = %self.id, client = %id, "client left before its join sweep");
                return Ok(());
            }
            registry
                .network_entities()
                .iter()
                .filter(|entity| entity.id() != id)
                .cloned()
                .collect()
        };
        let recipients = [client];
        for entity in &visible {
            replication::construct(entity, &recipients);
        }
        debug!(zone = %self.id, entities = visible.len(), "join sweep sent");
        Ok(())
    }

    /// Forget an entity. Nothing is sent; see [`Zone::despawn`] for
    /// destroy-and-unregister.
    pub fn unregister(&self, id: EntityId) -> Option<Member> {
        let removed = self.write().unregister(id);
        if removed.is_some() {
            debug!(zone = %self.id, entity = %id, "unregistered entity");
        }
        removed
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.read().contains(id)
    }

    /// Strict lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if `id` is not registered.
    pub fn lookup(&self, id: EntityId) -> Result<Member, ZoneError> {
        self.read().lookup(id)
    }

    /// Lookup that reports absence as `None`.
    #[must_use]
    pub fn try_lookup(&self, id: EntityId) -> Option<Member> {
        self.read().try_lookup(id)
    }

    /// Strict lookup restricted to members of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if no member of `kind` has `id`.
    pub fn lookup_kind(&self, id: EntityId, kind: EntityKind) -> Result<Member, ZoneError> {
        self.read().lookup_kind(id, kind)
    }

    /// Lookup restricted to members of `kind`.
    #[must_use]
    pub fn try_lookup_kind(&self, id: EntityId, kind: EntityKind) -> Option<Member> {
        self.read().try_lookup_kind(id, kind)
    }

    /// Strict client lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if no client has `id`.
    pub fn lookup_client(&self, id: EntityId) -> Result<Arc<Client>, ZoneError> {
        self.read().lookup_client(id)
    }

    /// Client lookup that reports absence as `None`.
    #[must_use]
    pub fn try_lookup_client(&self, id: EntityId) -> Option<Arc<Client>> {
        self.read().try_lookup_client(id)
    }

    /// Snapshot of every member, in registration order.
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        self.read().members().to_vec()
    }

    /// Snapshot of the network entities.
    #[must_use]
    pub fn network_entities(&self) -> Vec<Arc<dyn NetworkEntity>> {
        self.read().network_entities().to_vec()
    }

    /// Snapshot of the connected clients. A client that is still joining is
    /// not included.
    #[must_use]
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.read().clients().to_vec()
    }

    /// Number of registered entities, clients included.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.read().len()
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.read().client_count()
    }

    // -- gameplay ------------------------------------------------------------

    /// Bring a spawn product into the zone: register it, start it and, if it
    /// replicates, construct it to every connected client.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken, or
    /// [`ZoneError::Instantiation`] if the entity fails to start (it is
    /// unregistered again).
    pub fn spawn(&self, product: EntityRef) -> Result<(), ZoneError> {
        let id = product.id();
        match &product {
            EntityRef::Local(entity) => self.register(entity.clone())?,
            EntityRef::Network(entity) => self.register_network(entity.clone())?,
        }

        if let Err(source) = product.start() {
            self.unregister(id);
            return Err(ZoneError::Instantiation {
                subject: format!("{} {id}", product.name()),
                source,
            });
        }

        if let Some(entity) = product.as_network() {
            self.construct_to_all(entity);
        }
        debug!(zone = %self.id, entity = %id, name = product.name(), "spawned");
        Ok(())
    }

    /// Remove an entity: destroy it on every client, then unregister it.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if `id` is not registered.
    pub fn despawn(&self, id: EntityId) -> Result<Member, ZoneError> {
        let member = self.lookup(id)?;
        if member.is(EntityKind::Network) {
            self.destroy_to_all(id);
        }
        self.unregister(id);
        debug!(zone = %self.id, entity = %id, "despawned");
        Ok(member)
    }

    /// Remove a client: unregister it, then destroy its avatar on every
    /// remaining client.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if no client has `id`.
    pub fn remove_client(&self, id: EntityId) -> Result<Arc<Client>, ZoneError> {
        let client = self.lookup_client(id)?;
        self.unregister(id);
        self.destroy_to_all(id);
        info!(zone = %self.id, client = %id, "client removed");
        Ok(client)
    }

    /// Construct `entity` to every connected client.
    pub fn construct_to_all(&self, entity: &Arc<dyn NetworkEntity>) {
        let _fan_out = self.lock_fan_out();
        replication::construct(entity, &self.clients());
    }

    /// Construct `entity` to every connected client except `skip`.
    pub fn construct_to_others(&self, entity: &Arc<dyn NetworkEntity>, skip: EntityId) {
        let _fan_out = self.lock_fan_out();
        let others: Vec<Arc<Client>> = self
            .clients()
            .into_iter()
            .filter(|client| client.id() != skip)
            .collect();
        replication::construct(entity, &others);
    }

    /// Send `entity`'s state to every connected client that can see it.
    pub fn serialize_to_all(&self, entity: &Arc<dyn NetworkEntity>) {
        let _fan_out = self.lock_fan_out();
        replication::serialize(entity, &self.clients());
    }

    /// Destroy `entity` on every connected client that can see it.
    pub fn destroy_to_all(&self, entity: EntityId) {
        let _fan_out = self.lock_fan_out();
        replication::destroy(entity, &self.clients());
    }
}
