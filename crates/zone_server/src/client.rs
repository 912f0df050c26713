//! Connected participants.

use std::sync::Arc;

use zone_entity::{EntityId, NetworkEntity};
use zone_net::{NetError, Transport, Visibility};

/// A connected participant.
///
/// A client is itself a network entity: its avatar is what other clients see
/// of it. It also carries the per-connection [`Visibility`] and
/// [`Transport`] that replication writes through.
pub struct Client {
    avatar: Arc<dyn NetworkEntity>,
    visibility: Arc<dyn Visibility>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client around an avatar and its connection collaborators.
    #[must_use]
    pub fn new(
        avatar: Arc<dyn NetworkEntity>,
        visibility: Arc<dyn Visibility>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            avatar,
            visibility,
            transport,
        }
    }

    /// The client's entity identifier (its avatar's).
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.avatar.id()
    }

    /// The avatar other clients see.
    #[must_use]
    pub fn avatar(&self) -> &Arc<dyn NetworkEntity> {
        &self.avatar
    }

    /// What this client can see.
    #[must_use]
    pub fn visibility(&self) -> &Arc<dyn Visibility> {
        &self.visibility
    }

    /// Deliver raw bytes to this client.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::TransportClosed`] once the connection is gone.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), NetError> {
        self.transport.send(bytes)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id())
            .field("name", &self.avatar.name())
            .finish_non_exhaustive()
    }
}
