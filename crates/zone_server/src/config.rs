//! Zone configuration.

use std::time::Duration;

use crate::error::ZoneError;
use crate::tick::{QuotaPolicy, TickConfig};

/// Configuration for one zone process.
#[derive(Debug, Clone, Default)]
pub struct ZoneConfig {
    /// Tick cadence.
    pub tick: TickConfig,
    /// Optional NATS URL override (defaults to `NATS_URL` env or localhost).
    pub nats_url: Option<String>,
}

impl ZoneConfig {
    /// Create a config with default cadence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the target tick rate.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick.tick_rate = tick_rate;
        self
    }

    /// Override the housekeeping window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.tick.window = window;
        self
    }

    /// Override what the tick loop does once its quota is spent.
    #[must_use]
    pub fn with_quota_policy(mut self, policy: QuotaPolicy) -> Self {
        self.tick.quota_policy = policy;
        self
    }

    /// Override the NATS URL for this zone.
    #[must_use]
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// The NATS URL to connect to.
    #[must_use]
    pub fn nats_url(&self) -> String {
        zone_net::connection::resolve_url(self.nats_url.as_deref())
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ZoneError> {
        self.tick.validate()
    }
}
