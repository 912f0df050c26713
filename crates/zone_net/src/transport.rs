//! Byte delivery to one client.
//!
//! The zone hands a transport complete messages and never waits for them;
//! framing, reliability and ordering below the message level belong to the
//! transport.
//!
//! Implementations:
//! - [`ChannelTransport`]: in-process unbounded channel, for local clients and tests.
//! - [`NatsTransport`]: publishes to a per-client NATS subject.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::NatsConnection;
use crate::error::NetError;

/// A handle that delivers byte messages to one client.
pub trait Transport: Send + Sync {
    /// Queue `bytes` for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::TransportClosed`] once the client side is gone.
    fn send(&self, bytes: Vec<u8>) -> Result<(), NetError>;
}

/// In-process transport backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    /// Create a transport and the receiver that observes what it sends.
    #[must_use]
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), NetError> {
        self.tx.send(bytes).map_err(|_| NetError::TransportClosed)
    }
}

/// Transport that publishes every message to a fixed NATS subject.
///
/// Messages are forwarded by a background task in the order they were sent,
/// so `send` never blocks on the network.
#[derive(Debug, Clone)]
pub struct NatsTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl NatsTransport {
    /// Start forwarding to `subject`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(conn: NatsConnection, subject: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                if let Err(e) = conn.publish_bytes(&subject, bytes).await {
                    warn!(subject, error = %e, "failed to forward message");
                }
            }
            debug!(subject, "transport closed");
        });
        Self { tx }
    }
}

impl Transport for NatsTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), NetError> {
        self.tx.send(bytes).map_err(|_| NetError::TransportClosed)
    }
}
