//! Parking spotter - reports the car space in front of the house
//!
//! Polls a lidar on the serial port while the companion device says the user is
//! in zone looking for a park, and publishes the space's status to the cloud.
//!
//! Module structure:
//! - `domain/` - Core types (DistanceCm, OccupancyStatus, Thresholds)
//! - `io/` - External interfaces (lidar serial port, Particle cloud)
//! - `services/` - Classification and the Idle/Active poll loop
//! - `infra/` - Infrastructure (Config, Metrics, Pacer)

use anyhow::Context;
use clap::Parser;
use parking_spotter::infra::{Config, Metrics};
use parking_spotter::io::{ParticleClient, SensorReader};
use parking_spotter::services::{LoopTiming, PollLoop};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Parking spotter - lidar car space reporter
#[derive(Parser, Debug)]
#[command(name = "parking-spotter", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    // Default: INFO, use RUST_LOG=debug for every reading and zone check
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves once Ctrl+C (or SIGTERM on unix) arrives
async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "sigterm_handler_unavailable");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "parking_spotter_starting");

    let config = Config::load_from_path(&args.config).with_env_overrides();
    config.require_credentials()?;

    let thresholds = config.thresholds();
    info!(
        config_file = %config.config_file(),
        device_id = %config.device_id(),
        sensor_device = %config.sensor_device(),
        sensor_baud = %config.sensor_baud(),
        traffic_cm = %thresholds.traffic_cm,
        nothing_cm = %thresholds.nothing_cm,
        recheck_secs = %config.recheck_interval().as_secs(),
        idle_poll_secs = %config.idle_poll_interval().as_secs(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());

    // Periodic metrics summary
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    let sensor = SensorReader::from_config(&config).with_metrics(metrics.clone());
    let remote = ParticleClient::new(&config).context("failed to build HTTP client")?;
    let poll_loop =
        PollLoop::new(sensor, remote, thresholds, LoopTiming::from_config(&config), metrics.clone());

    // Handle shutdown on Ctrl+C / SIGTERM
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        termination_signal().await;
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    poll_loop.run(shutdown_rx).await;

    metrics.report().log();
    info!("parking_spotter shutdown complete");
    Ok(())
}
