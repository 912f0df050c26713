//! # zone_net
//!
//! Network layer for the zone runtime.
//!
//! This crate provides:
//!
//! - [`frame`] — replication frame headers (construction, serialization,
//!   destruction) on top of the bit stream.
//! - [`visibility`] — the per-client network-id mapping the replication
//!   protocol is gated by.
//! - [`transport`] — byte delivery to one client.
//! - [`messages`] — control messages exchanged with the zone over NATS.
//! - [`subjects`] — NATS subject builders.
//! - [`codec`] — MessagePack serialisation/deserialisation helpers.
//! - [`connection`] — NATS connection management.
//! - [`error`] — Network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod messages;
pub mod subjects;
pub mod transport;
pub mod visibility;

pub use codec::{decode, encode};
pub use connection::NatsConnection;
pub use error::NetError;
pub use frame::{FrameHeader, FrameKind, NetworkId};
pub use transport::{ChannelTransport, NatsTransport, Transport};
pub use visibility::{GrantCallback, ImmediateVisibility, Visibility};
