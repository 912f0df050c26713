//! Gameplay message fan-out.
//!
//! These helpers sit beside replication, not on top of it: a message goes to
//! every addressed client whether or not that client can see anything. The
//! message is encoded once and the same bytes go to each recipient.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use zone_entity::EntityId;
use zone_net::NetError;

use crate::client::Client;
use crate::zone::Zone;

fn fan_out(bytes: &[u8], recipients: &[Arc<Client>]) -> usize {
    let mut delivered = 0;
    for client in recipients {
        match client.send(bytes.to_vec()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!(client = %client.id(), error = %e, "message not delivered"),
        }
    }
    delivered
}

impl Zone {
    /// Send `message` to exactly `recipients`. Returns how many accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if the message cannot be encoded.
    pub fn send_to<M: Serialize>(
        &self,
        message: &M,
        recipients: &[Arc<Client>],
    ) -> Result<usize, NetError> {
        let bytes = zone_net::encode(message)?;
        Ok(fan_out(&bytes, recipients))
    }

    /// Send `message` to every connected client except `excluded`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if the message cannot be encoded.
    pub fn broadcast_except<M: Serialize>(
        &self,
        message: &M,
        excluded: EntityId,
    ) -> Result<usize, NetError> {
        let recipients: Vec<Arc<Client>> = self
            .clients()
            .into_iter()
            .filter(|client| client.id() != excluded)
            .collect();
        self.send_to(message, &recipients)
    }

    /// Send `message` to every connected client.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if the message cannot be encoded.
    pub fn broadcast<M: Serialize>(&self, message: &M) -> Result<usize, NetError> {
        self.send_to(message, &self.clients())
    }
}
