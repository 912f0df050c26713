//! The zone's entity registry.
//!
//! The registry keeps a dense, registration-ordered index of every entity in
//! the zone, plus two narrower views: the network entities eligible for
//! replication and the connected clients. Every client is also a network
//! entity and every network entity is also an entity.
//!
//! The registry holds shared handles only. It does not decide when an entity
//! dies; it only forgets it on [`unregister`](EntityRegistry::unregister).
//!
//! Identifiers are unique: registering an id that is already present is
//! rejected with [`ZoneError::DuplicateEntity`]. Lookups scan linearly.
//!
//! A client may be registered as *joining*: it is a member and its avatar is
//! a network entity, but it stays out of [`clients`](EntityRegistry::clients)
//! until [`finish_join`](EntityRegistry::finish_join) promotes it.

use std::sync::Arc;

use zone_entity::{Entity, EntityError, EntityId, NetworkEntity};

use crate::client::Client;
use crate::error::ZoneError;

/// The narrowest kind a lookup may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Any registered entity.
    Any,
    /// Entities eligible for replication (clients included).
    Network,
    /// Connected clients only.
    Client,
}

/// One registered member, tagged by the capabilities it was registered with.
#[derive(Clone)]
pub enum Member {
    /// A server-side entity that never replicates.
    Local(Arc<dyn Entity>),
    /// An entity eligible for replication.
    Network(Arc<dyn NetworkEntity>),
    /// A connected client.
    Client(Arc<Client>),
}

impl Member {
    /// The member's identifier.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Local(entity) => entity.id(),
            Self::Network(entity) => entity.id(),
            Self::Client(client) => client.id(),
        }
    }

    /// The member's log name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Local(entity) => entity.name(),
            Self::Network(entity) => entity.name(),
            Self::Client(client) => client.avatar().name(),
        }
    }

    /// Advance the member by one tick.
    ///
    /// # Errors
    ///
    /// Propagates the entity's own update failure.
    pub fn update(&self, dt: f32) -> Result<(), EntityError> {
        match self {
            Self::Local(entity) => entity.update(dt),
            Self::Network(entity) => entity.update(dt),
            Self::Client(client) => client.avatar().update(dt),
        }
    }

    /// Returns `true` if the member satisfies `kind`.
    #[must_use]
    pub fn is(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Any => true,
            EntityKind::Network => matches!(self, Self::Network(_) | Self::Client(_)),
            EntityKind::Client => matches!(self, Self::Client(_)),
        }
    }

    /// The network view of the member, if it has one.
    #[must_use]
    pub fn as_network(&self) -> Option<&Arc<dyn NetworkEntity>> {
        match self {
            Self::Local(_) => None,
            Self::Network(entity) => Some(entity),
            Self::Client(client) => Some(client.avatar()),
        }
    }

    /// The client view of the member, if it is one.
    #[must_use]
    pub fn as_client(&self) -> Option<&Arc<Client>> {
        match self {
            Self::Client(client) => Some(client),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Local(_) => "Local",
            Self::Network(_) => "Network",
            Self::Client(_) => "Client",
        };
        f.debug_struct("Member")
            .field("kind", &kind)
            .field("id", &self.id())
            .finish()
    }
}

/// The zone's membership set.
#[derive(Default)]
pub struct EntityRegistry {
    /// Every member, in registration order.
    members: Vec<Member>,
    /// Network entities eligible for replication, in registration order.
    network: Vec<Arc<dyn NetworkEntity>>,
    /// Connected clients, in registration order.
    clients: Vec<Arc<Client>>,
    /// Clients registered but not yet promoted to `clients`.
    joining: Vec<Arc<Client>>,
}

impl EntityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_vacant(&self, id: EntityId) -> Result<(), ZoneError> {
        if self.contains(id) {
            return Err(ZoneError::DuplicateEntity(id));
        }
        Ok(())
    }

    /// Register a server-side entity.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken.
    pub fn register(&mut self, entity: Arc<dyn Entity>) -> Result<(), ZoneError> {
        self.ensure_vacant(entity.id())?;
        self.members.push(Member::Local(entity));
        Ok(())
    }

    /// Register an entity eligible for replication.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken.
    pub fn register_network(&mut self, entity: Arc<dyn NetworkEntity>) -> Result<(), ZoneError> {
        self.ensure_vacant(entity.id())?;
        self.network.push(entity.clone());
        self.members.push(Member::Network(entity));
        Ok(())
    }

    /// Register a client that does not receive zone-wide traffic yet.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::DuplicateEntity`] if the id is taken.
    pub fn register_joining(&mut self, client: Arc<Client>) -> Result<(), ZoneError> {
        self.ensure_vacant(client.id())?;
        self.network.push(client.avatar().clone());
        self.joining.push(client.clone());
        self.members.push(Member::Client(client));
        Ok(())
    }

    /// Promote a joining client to the connected clients.
    ///
    /// Returns `false` if `id` is not joining (never registered, already
    /// promoted, or unregistered in the meantime).
    pub fn finish_join(&mut self, id: EntityId) -> bool {
        let Some(pos) = self.joining.iter().position(|c| c.id() == id) else {
            return false;
        };
        let client = self.joining.remove(pos);
        self.clients.push(client);
        true
    }

    /// Forget an entity, removing it from every view it was part of.
    ///
    /// Returns the removed member, or `None` if it was not registered.
    pub fn unregister(&mut self, id: EntityId) -> Option<Member> {
        let pos = self.members.iter().position(|m| m.id() == id)?;
        let member = self.members.remove(pos);
        if member.is(EntityKind::Network) {
            self.network.retain(|e| e.id() != id);
        }
        if member.is(EntityKind::Client) {
            self.clients.retain(|c| c.id() != id);
            self.joining.retain(|c| c.id() != id);
        }
        Some(member)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.members.iter().any(|m| m.id() == id)
    }

    /// Strict lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if `id` is not registered.
    pub fn lookup(&self, id: EntityId) -> Result<Member, ZoneError> {
        self.try_lookup(id).ok_or(ZoneError::NotFound(id))
    }

    /// Lookup that reports absence as `None`.
    #[must_use]
    pub fn try_lookup(&self, id: EntityId) -> Option<Member> {
        self.try_lookup_kind(id, EntityKind::Any)
    }

    /// Strict lookup restricted to members of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if no member of `kind` has `id`.
    pub fn lookup_kind(&self, id: EntityId, kind: EntityKind) -> Result<Member, ZoneError> {
        self.try_lookup_kind(id, kind)
            .ok_or(ZoneError::NotFound(id))
    }

    /// Lookup restricted to members of `kind` that reports absence as `None`.
    #[must_use]
    pub fn try_lookup_kind(&self, id: EntityId, kind: EntityKind) -> Option<Member> {
        self.members
            .iter()
            .filter(|m| m.is(kind))
            .find(|m| m.id() == id)
            .cloned()
    }

    /// Strict client lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] if no client has `id`.
    pub fn lookup_client(&self, id: EntityId) -> Result<Arc<Client>, ZoneError> {
        self.try_lookup_client(id).ok_or(ZoneError::NotFound(id))
    }

    /// Client lookup that reports absence as `None`. Joining clients are
    /// found too.
    #[must_use]
    pub fn try_lookup_client(&self, id: EntityId) -> Option<Arc<Client>> {
        self.clients
            .iter()
            .chain(&self.joining)
            .find(|c| c.id() == id)
            .cloned()
    }

    /// Network entity lookup that reports absence as `None`.
    #[must_use]
    pub fn try_lookup_network(&self, id: EntityId) -> Option<Arc<dyn NetworkEntity>> {
        self.network.iter().find(|e| e.id() == id).cloned()
    }

    /// Every member, in registration order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Network entities eligible for replication, in registration order.
    #[must_use]
    pub fn network_entities(&self) -> &[Arc<dyn NetworkEntity>] {
        &self.network
    }

    /// Connected clients, in promotion order. Joining clients are not
    /// included.
    #[must_use]
    pub fn clients(&self) -> &[Arc<Client>] {
        &self.clients
    }

    /// Total number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of connected clients, joining clients excluded.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("members", &self.members)
            .field("network", &self.network.len())
            .field("clients", &self.clients.len())
            .field("joining", &self.joining.len())
            .finish()
    }
}
