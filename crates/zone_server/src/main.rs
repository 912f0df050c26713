//! # zone_server
//!
//! Runs one zone as a process.
//!
//! ## Startup Sequence
//!
//! 1. Load the content description (optional; an empty zone otherwise).
//! 2. Initialize the zone and start its scheduler.
//! 3. Connect to NATS and serve join/leave requests.
//! 4. On Ctrl-C, or if the scheduler faults, destroy the zone and exit.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use zone_net::NatsConnection;
use zone_server::props::PropFactory;
use zone_server::{
    ContentDescription, NoScripts, QuotaPolicy, Server, ZoneConfig, ZoneId, gateway,
};

#[derive(Parser)]
#[command(name = "zone_server", about = "Runs one world zone")]
struct Args {
    /// Zone (map) type
    #[arg(long)]
    zone_type: u32,

    /// Instance of the zone type
    #[arg(long, default_value_t = 0)]
    instance: u32,

    /// Clone of the instance
    #[arg(long, default_value_t = 0)]
    clone_id: u32,

    /// Path to a JSON content description
    #[arg(long)]
    content: Option<PathBuf>,

    /// Target ticks per second
    #[arg(long, default_value_t = 20)]
    tick_rate: u32,

    /// Yield instead of sleeping while the tick quota is spent
    #[arg(long)]
    busy_poll: bool,

    /// NATS server URL (defaults to $NATS_URL, then nats://localhost:4222)
    #[arg(long)]
    nats_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zone_server=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = ZoneConfig::new().with_tick_rate(args.tick_rate);
    if args.busy_poll {
        config = config.with_quota_policy(QuotaPolicy::Poll);
    }
    if let Some(url) = args.nats_url {
        config = config.with_nats_url(url);
    }
    config.validate()?;

    let content = match &args.content {
        Some(path) => {
            info!(path = %path.display(), "loading content description");
            ContentDescription::from_file(path)?
        }
        None => {
            warn!("no content description given, starting an empty zone");
            ContentDescription::default()
        }
    };

    let server = Server::new();
    let id = ZoneId::new(args.zone_type, args.instance, args.clone_id);
    let zone = server.create_zone(id, config);

    let scheduler = zone
        .initialize(&content, &PropFactory::new(), &NoScripts)
        .await?;

    let conn = NatsConnection::connect_to(&zone.config().nats_url()).await?;
    let gateway_task = tokio::spawn(gateway::run(zone.clone(), conn));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!(zone = %id, "shutdown requested");
        }
        () = zone.stopped() => {
            warn!(zone = %id, "zone stopped on its own");
        }
    }

    zone.destroy().await;
    if let Err(e) = scheduler.join().await {
        error!(zone = %id, error = %e, "scheduler ended with a fault");
    }
    match gateway_task.await {
        Ok(Err(e)) => error!(zone = %id, error = %e, "gateway failed"),
        Err(e) => error!(zone = %id, error = %e, "gateway task failed"),
        Ok(Ok(())) => {}
    }

    info!(zone = %id, "zone server shut down");
    Ok(())
}
