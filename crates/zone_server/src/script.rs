//! The scripting subsystem, as seen by the zone.
//!
//! Scripts are loaded once during initialization, after every level object
//! and spawner path is in place and before the zone is marked loaded.

use futures::future::BoxFuture;

use crate::zone::Zone;

/// Raised when the script subsystem cannot load.
#[derive(Debug, thiserror::Error)]
#[error("script `{script}` failed to load: {reason}")]
pub struct ScriptError {
    /// The script that failed.
    pub script: String,
    /// Human-readable cause.
    pub reason: String,
}

/// The scripting subsystem collaborator.
pub trait ScriptHost: Send + Sync {
    /// Load every script for `zone`. A failure aborts zone startup.
    fn load_scripts<'a>(&'a self, zone: &'a Zone) -> BoxFuture<'a, Result<(), ScriptError>>;
}

/// A script host with nothing to load.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScripts;

impl ScriptHost for NoScripts {
    fn load_scripts<'a>(&'a self, _zone: &'a Zone) -> BoxFuture<'a, Result<(), ScriptError>> {
        Box::pin(async { Ok(()) })
    }
}
