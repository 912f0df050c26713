//! Zone tick scheduler.
//!
//! Two loops run side by side for every started zone:
//!
//! 1. The tick loop sleeps one tick interval, updates every registered
//!    entity, and records how long the tick took. Once the current window's
//!    tick quota is spent it stops advancing until housekeeping opens a new
//!    window.
//! 2. The housekeeping loop wakes once per window, reports throughput,
//!    resets the window counters and refreshes the server-wide client count.
//!
//! Both loops exit when the zone leaves the running state. They run inside a
//! supervised task: a fault outside the per-entity guard stops the zone and
//! comes back out of [`SchedulerHandle::join`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ZoneError;
use crate::zone::Zone;

/// What the tick loop does while the window's tick quota is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotaPolicy {
    /// Sleep one tick interval, then check again.
    #[default]
    Sleep,
    /// Yield to the runtime and check again immediately. Keeps a core busy.
    Poll,
}

/// Configuration for the zone tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per window.
    pub tick_rate: u32,
    /// Length of the rate-limit and housekeeping window.
    pub window: Duration,
    /// Behaviour once the window's quota is spent.
    pub quota_policy: QuotaPolicy,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            window: Duration::from_secs(1),
            quota_policy: QuotaPolicy::Sleep,
        }
    }
}

impl TickConfig {
    /// Time slept before each tick: one second divided by the tick rate.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.tick_rate.max(1)))
    }

    /// Check the cadence values.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::InvalidConfig`] for a zero tick rate or window.
    pub fn validate(&self) -> Result<(), ZoneError> {
        if self.tick_rate == 0 {
            return Err(ZoneError::InvalidConfig("tick_rate must be positive".into()));
        }
        if self.window.is_zero() {
            return Err(ZoneError::InvalidConfig("window must be positive".into()));
        }
        Ok(())
    }
}

/// Tick counters shared between the tick loop and housekeeping.
#[derive(Debug, Default)]
pub struct TickStats {
    total_ticks: AtomicU64,
    window_ticks: AtomicU64,
    window_elapsed_us: AtomicU64,
    last_delta_us: AtomicU64,
}

/// Counters of one closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
    /// Ticks completed in the window.
    pub ticks: u64,
    /// Wall-clock time those ticks took, sleeps included.
    pub elapsed: Duration,
}

impl TickWindow {
    /// Mean wall-clock duration of a tick, if any tick ran.
    #[must_use]
    pub fn mean_tick(&self) -> Option<Duration> {
        let ticks = u32::try_from(self.ticks).ok().filter(|t| *t > 0)?;
        Some(self.elapsed / ticks)
    }
}

impl TickStats {
    /// Ticks completed since the scheduler started.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks.load(Ordering::Acquire)
    }

    /// Ticks completed in the current window.
    #[must_use]
    pub fn window_ticks(&self) -> u64 {
        self.window_ticks.load(Ordering::Acquire)
    }

    /// Duration of the most recent tick.
    #[must_use]
    pub fn last_delta(&self) -> Duration {
        Duration::from_micros(self.last_delta_us.load(Ordering::Acquire))
    }

    fn record_tick(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_delta_us.store(micros, Ordering::Release);
        self.window_elapsed_us.fetch_add(micros, Ordering::AcqRel);
        self.window_ticks.fetch_add(1, Ordering::AcqRel);
        self.total_ticks.fetch_add(1, Ordering::AcqRel);
    }

    /// Close the current window, returning its counters and starting a new one.
    pub fn take_window(&self) -> TickWindow {
        let ticks = self.window_ticks.swap(0, Ordering::AcqRel);
        let elapsed_us = self.window_elapsed_us.swap(0, Ordering::AcqRel);
        TickWindow {
            ticks,
            elapsed: Duration::from_micros(elapsed_us),
        }
    }
}

/// Handle to a zone's supervised scheduler task.
#[derive(Debug)]
pub struct SchedulerHandle {
    task: JoinHandle<Result<(), ZoneError>>,
}

impl SchedulerHandle {
    /// Returns `true` once the scheduler has stopped, cleanly or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the scheduler to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::SchedulerFault`] if the scheduler died instead of
    /// stopping with its zone.
    pub async fn join(self) -> Result<(), ZoneError> {
        match self.task.await {
            Ok(result) => result,
            Err(join_error) => Err(ZoneError::SchedulerFault(join_error.to_string())),
        }
    }
}

/// Spawn the supervised tick and housekeeping loops for `zone`.
pub(crate) fn spawn(zone: Arc<Zone>) -> SchedulerHandle {
    let work = drive(zone.clone());
    SchedulerHandle {
        task: tokio::spawn(supervise(zone, work)),
    }
}

async fn drive(zone: Arc<Zone>) -> Result<(), ZoneError> {
    tokio::try_join!(run_ticks(zone.clone()), run_housekeeping(zone))?;
    Ok(())
}

/// Run `work` in its own task and turn any failure, panics included, into a
/// logged [`ZoneError`] that stops `zone` and removes it from its server.
pub(crate) async fn supervise<F>(zone: Arc<Zone>, work: F) -> Result<(), ZoneError>
where
    F: Future<Output = Result<(), ZoneError>> + Send + 'static,
{
    let outcome = match tokio::spawn(work).await {
        Ok(result) => result,
        Err(join_error) => Err(ZoneError::SchedulerFault(join_error.to_string())),
    };
    if let Err(e) = &outcome {
        error!(zone = %zone.id(), error = %e, "scheduler fault, stopping zone");
        if zone.mark_stopped() {
            zone.leave_server();
        }
    }
    outcome
}

async fn run_ticks(zone: Arc<Zone>) -> Result<(), ZoneError> {
    let config = zone.config().tick.clone();
    let interval = config.tick_interval();
    let quota = u64::from(config.tick_rate);
    let stats = zone.stats();

    info!(
        zone = %zone.id(),
        tick_rate = config.tick_rate,
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        "starting tick loop"
    );

    let mut last = Instant::now();
    let mut dt = interval.as_secs_f32();

    while zone.is_running() {
        if stats.window_ticks() >= quota {
            match config.quota_policy {
                QuotaPolicy::Sleep => tokio::time::sleep(interval).await,
                QuotaPolicy::Poll => tokio::task::yield_now().await,
            }
            continue;
        }

        tokio::time::sleep(interval).await;
        if !zone.is_running() {
            break;
        }

        let failures = sweep(&zone, dt);

        let elapsed = last.elapsed();
        dt = elapsed.as_secs_f32();
        stats.record_tick(elapsed);
        last = Instant::now();

        debug!(
            zone = %zone.id(),
            tick_id = stats.total_ticks(),
            dt,
            failures,
            "tick"
        );
    }

    info!(zone = %zone.id(), ticks = stats.total_ticks(), "tick loop stopped");
    Ok(())
}

/// Update every registered entity once. A failing or panicking entity is
/// logged and skipped. Returns how many entities failed.
pub(crate) fn sweep(zone: &Zone, dt: f32) -> usize {
    let members = zone.members();
    let mut failures = 0;
    for member in &members {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| member.update(dt)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                warn!(zone = %zone.id(), entity = %member.id(), error = %e, "entity update failed");
            }
            Err(payload) => {
                failures += 1;
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(zone = %zone.id(), entity = %member.id(), reason, "entity update panicked");
            }
        }
    }
    failures
}

async fn run_housekeeping(zone: Arc<Zone>) -> Result<(), ZoneError> {
    let window = zone.config().tick.window;
    loop {
        tokio::time::sleep(window).await;
        if !zone.is_running() {
            break;
        }
        housekeeping(&zone);
    }
    Ok(())
}

fn housekeeping(zone: &Zone) {
    let closed = zone.stats().take_window();
    if let Some(mean) = closed.mean_tick() {
        let window_secs = zone.config().tick.window.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let tps = closed.ticks as f64 / window_secs;
        info!(
            zone = %zone.id(),
            tps,
            mean_tick_ms = mean.as_secs_f64() * 1000.0,
            "tick throughput"
        );
    }
    if let Some(server) = zone.server() {
        server.recount_active_clients();
    }
}

#[cfg(test)]
mod tests {
    use zone_entity::EntityId;

    use super::*;
    use crate::config::ZoneConfig;
    use crate::server::Server;
    use crate::testing::{Counter, Faulty, Panicky, test_client, test_zone};
    use crate::zone::{ZoneId, ZoneState};

    #[test]
    fn test_tick_interval() {
        let config = TickConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        let fast = TickConfig {
            tick_rate: 30,
            ..TickConfig::default()
        };
        assert_eq!(fast.tick_interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_window_accounting() {
        let stats = TickStats::default();
        stats.record_tick(Duration::from_millis(50));
        stats.record_tick(Duration::from_millis(70));
        assert_eq!(stats.total_ticks(), 2);
        assert_eq!(stats.window_ticks(), 2);
        assert_eq!(stats.last_delta(), Duration::from_millis(70));

        let window = stats.take_window();
        assert_eq!(window.ticks, 2);
        assert_eq!(window.mean_tick(), Some(Duration::from_millis(60)));
        assert_eq!(stats.window_ticks(), 0);
        assert_eq!(stats.total_ticks(), 2);
        assert_eq!(stats.take_window().mean_tick(), None);
    }

    #[test]
    fn test_sweep_skips_failing_entities() {
        let zone = test_zone(ZoneConfig::new());
        let before = Counter::new(1);
        let after = Counter::new(4);
        zone.register(before.clone()).unwrap();
        zone.register(Faulty::new(2)).unwrap();
        zone.register(Panicky::new(3)).unwrap();
        zone.register(after.clone()).unwrap();

        assert_eq!(sweep(&zone, 0.05), 2);
        assert_eq!(before.updates(), 1);
        assert_eq!(after.updates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_advances_entities() {
        let zone = test_zone(ZoneConfig::new());
        let counter = Counter::new(1);
        zone.register(counter.clone()).unwrap();

        let handle = zone.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(525)).await;
        assert_eq!(counter.updates(), 10);
        assert!((counter.last_dt() - 0.05).abs() < 0.01);

        zone.destroy().await;
        handle.join().await.unwrap();
        assert_eq!(zone.state(), ZoneState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_quota_caps_sweeps_per_window() {
        // A two-second window with a quota of 20 ticks: the loop could fit 40
        // intervals, but must stall after the 20th until the window closes.
        let config = ZoneConfig::new().with_window(Duration::from_secs(2));
        let zone = test_zone(config);
        let counter = Counter::new(1);
        zone.register(counter.clone()).unwrap();

        let handle = zone.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(counter.updates(), 20);
        assert_eq!(zone.stats().window_ticks(), 20);

        // Housekeeping at 2s opens a new window and ticking resumes.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(counter.updates() > 20);
        assert!(counter.updates() <= 40);

        zone.destroy().await;
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_entity_does_not_stop_scheduler() {
        let zone = test_zone(ZoneConfig::new());
        let counter = Counter::new(1);
        zone.register(Panicky::new(2)).unwrap();
        zone.register(counter.clone()).unwrap();

        let handle = zone.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(260)).await;
        assert_eq!(counter.updates(), 5);
        assert!(!handle.is_finished());
        assert!(zone.is_running());

        zone.destroy().await;
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_housekeeping_recounts_server_clients() {
        let server = Server::new();
        let zone = server.create_zone(ZoneId::new(1000, 1, 0), ZoneConfig::new());
        let (client, _rx) = test_client(50);
        zone.register_client(client).await.unwrap();
        assert_eq!(server.active_client_count(), 0);

        let handle = zone.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(server.active_client_count(), 1);

        zone.destroy().await;
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_supervise_surfaces_panics_and_stops_zone() {
        let zone = test_zone(ZoneConfig::new());
        zone.start().await.unwrap();
        assert!(zone.is_running());

        let result = supervise(zone.clone(), exploding_scheduler()).await;

        assert!(matches!(result, Err(ZoneError::SchedulerFault(_))));
        assert_eq!(zone.state(), ZoneState::Stopped);
    }

    #[tokio::test]
    async fn test_scheduler_fault_removes_zone_from_server() {
        let server = Server::new();
        let id = ZoneId::new(1000, 1, 0);
        let zone = server.create_zone(id, ZoneConfig::new());
        let (client, _rx) = test_client(50);
        zone.register_client(client).await.unwrap();
        server.recount_active_clients();
        assert_eq!(server.active_client_count(), 1);

        let result = supervise(zone.clone(), exploding_scheduler()).await;
        assert!(result.is_err());
        assert!(server.zone(id).is_none());
        assert_eq!(server.zone_count(), 0);
        assert_eq!(server.active_client_count(), 0);
    }

    #[tokio::test]
    async fn test_supervise_passes_errors_through() {
        let zone = test_zone(ZoneConfig::new());
        let result = supervise(zone.clone(), async {
            Err(ZoneError::NotFound(EntityId(1)))
        })
        .await;
        assert!(matches!(result, Err(ZoneError::NotFound(_))));
        assert_eq!(zone.state(), ZoneState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_before_first_tick() {
        let zone = test_zone(ZoneConfig::new());
        let counter = Counter::new(1);
        zone.register(counter.clone()).unwrap();
        let handle = zone.start().await.unwrap();
        zone.destroy().await;
        handle.join().await.unwrap();
        assert_eq!(counter.updates(), 0);
        assert!(!zone.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_poll_quota_holds_on_real_clock() {
        // 20 ticks per 1.3s window: the quota is spent after about a second
        // and the loop busy-polls until housekeeping opens the next window.
        let config = ZoneConfig::new()
            .with_window(Duration::from_millis(1300))
            .with_quota_policy(QuotaPolicy::Poll);
        let zone = test_zone(config);
        let counter = Counter::new(1);
        zone.register(counter.clone()).unwrap();

        let handle = zone.start().await.unwrap();
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(1250) {
            assert!(zone.stats().window_ticks() <= 20);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(counter.updates() > 20);
        assert!(zone.stats().window_ticks() <= 20);

        zone.destroy().await;
        handle.join().await.unwrap();
    }

    async fn exploding_scheduler() -> Result<(), ZoneError> {
        panic!("scheduler exploded")
    }
}
