//! Network-layer error types.

use zone_entity::BitError;

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a message to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a message from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// NATS publish error.
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// The receiving end of a transport has gone away.
    #[error("transport closed")]
    TransportClosed,

    /// A replication frame could not be parsed.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A replication frame ended early.
    #[error("truncated frame: {0}")]
    Truncated(#[from] BitError),
}
