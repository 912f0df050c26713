//! The replication protocol: construct, serialize and destroy frames.
//!
//! Every operation fans out over a set of recipient clients and goes
//! through each recipient's own [`Visibility`](zone_net::Visibility):
//!
//! - `construct` asks visibility to reveal the entity and sends the
//!   construction frame from the grant callback, whenever that fires.
//! - `serialize` sends a state frame only to recipients that already hold a
//!   network id for the entity.
//! - `destroy` sends a destruction frame to recipients holding an id, then
//!   drops their mapping.
//!
//! Delivery is fire-and-forget. A recipient whose transport is gone is logged
//! and skipped; the remaining recipients are still served.

use std::sync::Arc;

use tracing::{debug, warn};
use zone_entity::{EntityId, NetworkEntity};
use zone_net::{FrameKind, frame};

use crate::client::Client;

/// Reveal `entity` to every recipient and send its construction once each
/// grants a network id.
pub fn construct(entity: &Arc<dyn NetworkEntity>, recipients: &[Arc<Client>]) {
    for client in recipients {
        let target = entity.clone();
        let recipient = Arc::downgrade(client);
        client.visibility().reveal(
            entity.id(),
            Box::new(move |network_id| {
                let Some(recipient) = recipient.upgrade() else {
                    debug!(entity = %target.id(), %network_id, "grant for departed client");
                    return;
                };
                let bytes = frame::construction(network_id, |out| target.write_construct(out));
                deliver(&recipient, target.id(), FrameKind::Construction, bytes);
            }),
        );
    }
}

/// Send `entity`'s current state to every recipient that can see it.
pub fn serialize(entity: &Arc<dyn NetworkEntity>, recipients: &[Arc<Client>]) {
    for client in recipients {
        let Some(network_id) = client.visibility().try_get_id(entity.id()) else {
            continue;
        };
        let bytes = frame::serialization(network_id, |out| entity.write_serialize(out));
        deliver(client, entity.id(), FrameKind::Serialization, bytes);
    }
}

/// Tear down `entity` on every recipient that can see it and forget the
/// mapping.
pub fn destroy(entity: EntityId, recipients: &[Arc<Client>]) {
    for client in recipients {
        let visibility = client.visibility();
        let Some(network_id) = visibility.try_get_id(entity) else {
            continue;
        };
        deliver(client, entity, FrameKind::Destruction, frame::destruction(network_id));
        visibility.forget(entity);
    }
}

fn deliver(client: &Client, entity: EntityId, kind: FrameKind, bytes: Vec<u8>) {
    if let Err(e) = client.send(bytes) {
        warn!(client = %client.id(), %entity, ?kind, error = %e, "replication frame dropped");
    }
}
