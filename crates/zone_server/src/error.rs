//! Zone-level error types.

use zone_entity::{EntityError, EntityId};
use zone_net::NetError;

use crate::content::ContentError;
use crate::script::ScriptError;

/// Errors surfaced by zone operations.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    /// A strict lookup found no matching entity.
    #[error("{0} not found")]
    NotFound(EntityId),

    /// An entity with the same identifier is already registered.
    #[error("{0} is already registered")]
    DuplicateEntity(EntityId),

    /// A level object or spawner path could not be brought into the zone.
    #[error("failed to instantiate {subject}: {source}")]
    Instantiation {
        /// What was being instantiated (e.g. `level object 42`).
        subject: String,
        /// The entity-side failure.
        #[source]
        source: EntityError,
    },

    /// The script subsystem failed to load. Fatal to startup.
    #[error(transparent)]
    ScriptLoad(#[from] ScriptError),

    /// The tick scheduler died outside the per-entity guard.
    #[error("scheduler fault: {0}")]
    SchedulerFault(String),

    /// The scheduler has already been started.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// The zone has been destroyed and cannot be restarted.
    #[error("zone has been destroyed")]
    Destroyed,

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network-layer failure.
    #[error(transparent)]
    Net(#[from] NetError),

    /// Content description failure.
    #[error(transparent)]
    Content(#[from] ContentError),
}
