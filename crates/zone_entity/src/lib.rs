//! # zone_entity
//!
//! The entity side of a zone: what a simulated unit is, which capabilities
//! it may expose, and how it writes itself onto the wire.
//!
//! This crate provides:
//!
//! - [`EntityId`] — lightweight `u64` entity identifiers.
//! - [`EntityIdAllocator`] — monotonically increasing, thread-safe ID allocator.
//! - [`Entity`], [`NetworkEntity`], [`Spawner`] — the capability interfaces
//!   the zone runtime dispatches through.
//! - [`EntityRef`] — the tagged variant a spawner hands back.
//! - [`BitWriter`] / [`BitReader`] — the bit-level stream replication
//!   payloads are written into.

pub mod bitstream;
pub mod capability;
pub mod entity;

pub use bitstream::{BitError, BitReader, BitWriter};
pub use capability::{Entity, EntityError, EntityRef, NetworkEntity, Spawner};
pub use entity::{EntityId, EntityIdAllocator};
