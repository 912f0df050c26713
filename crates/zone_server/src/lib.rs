//! # zone_server
//!
//! Runtime for one partition of the simulated world.
//!
//! A [`Zone`] tracks its entities in an [`EntityRegistry`], advances them at
//! a fixed cadence on a supervised tick scheduler, and keeps connected
//! [`Client`]s in sync through the replication protocol. Zones are created
//! by and report to a process-wide [`Server`].
//!
//! ## Startup Sequence
//!
//! 1. [`Server::create_zone`] builds the zone.
//! 2. [`Zone::initialize`] loads level objects and spawner paths through an
//!    [`EntityFactory`], awaits the [`ScriptHost`], marks the zone loaded and
//!    starts the scheduler.
//! 3. Clients join through [`Zone::register_client`] and receive the current
//!    world; gameplay uses [`Zone::spawn`], [`Zone::despawn`] and the
//!    replication and router helpers from then on.
//! 4. [`Zone::destroy`] stops the zone for good.

pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod factory;
pub mod gateway;
pub mod hooks;
mod pipeline;
pub mod props;
pub mod registry;
pub mod replication;
mod router;
pub mod script;
pub mod server;
pub mod tick;
pub mod zone;

#[cfg(test)]
pub(crate) mod testing;

pub use client::Client;
pub use config::ZoneConfig;
pub use content::ContentDescription;
pub use error::ZoneError;
pub use factory::{EntityFactory, Instance};
pub use registry::{EntityKind, EntityRegistry, Member};
pub use script::{NoScripts, ScriptError, ScriptHost};
pub use server::Server;
pub use tick::{QuotaPolicy, SchedulerHandle, TickConfig, TickStats};
pub use zone::{Zone, ZoneId, ZoneState};
