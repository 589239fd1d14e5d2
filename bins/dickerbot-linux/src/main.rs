mod config;
mod sim;
mod store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dickerbot_protocol::Direction;
use dickerbot_session::{OperatorClient, RelayConfig, RelayServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::HostConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dickerbot_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("DickerBot starting...");

    let config = HostConfig::from_env()?;
    tracing::info!(device = %config.node.device_id, "Simulated robot");

    // Start the relay
    let relay = RelayServer::new(RelayConfig {
        bind_addr: config.relay_addr,
        ..RelayConfig::default()
    });
    let relay_handle = tokio::spawn(async move {
        if let Err(e) = relay.run().await {
            tracing::error!("Relay error: {}", e);
        }
    });

    // The robot loop is synchronous and gets its own thread
    let shutdown = Arc::new(AtomicBool::new(false));
    let robot_handle = tokio::task::spawn_blocking({
        let config = config.clone();
        let runtime = tokio::runtime::Handle::current();
        let shutdown = shutdown.clone();
        move || sim::run_robot(config, runtime, shutdown)
    });

    let operator_url = config.relay_url();
    let operator_demo = config.operator_demo;
    let operator_handle = tokio::spawn(async move {
        if !operator_demo {
            return std::future::pending::<()>().await;
        }
        if let Err(e) = run_operator_demo(&operator_url).await {
            tracing::error!("Operator demo error: {}", e);
        }
    });

    tracing::info!("DickerBot ready!");
    tracing::info!("   Relay: {}", config.relay_url());
    tracing::info!("   Press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = relay_handle => {
            tracing::warn!("Relay stopped");
        }
        _ = operator_handle => {
            tracing::info!("Operator demo finished");
            tokio::signal::ctrl_c().await?;
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    if tokio::time::timeout(Duration::from_secs(2), robot_handle).await.is_err() {
        tracing::warn!("Robot loop did not stop in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Drive the robot through a short pattern while printing its telemetry.
async fn run_operator_demo(url: &str) -> anyhow::Result<()> {
    let operator = connect_with_retry(url).await?;

    // Wait for the robot's session to come up
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    while operator.sensor_data().await.is_none() {
        ticker.tick().await;
    }
    tracing::info!("Operator: robot is online");

    let pattern = [
        (120, Direction::Forward, 120, Direction::Forward),
        (80, Direction::Forward, 80, Direction::Backward),
        (100, Direction::Backward, 100, Direction::Backward),
        (0, Direction::Neutral, 0, Direction::Neutral),
    ];

    for (left_speed, left_dir, right_speed, right_dir) in pattern {
        operator.set_control_data(left_speed, left_dir, right_speed, right_dir)?;

        for _ in 0..4 {
            ticker.tick().await;
            if let Some(reading) = operator.sensor_data().await {
                let age_ms = (Utc::now() - reading.received_at).num_milliseconds();
                let s = reading.frame;
                tracing::info!(
                    "Operator: accel=({:.2},{:.2},{:.2}) gyro_z={:.2} t={:.1} dist=[{},{},{},{}] ({} ms old)",
                    s.ax, s.ay, s.az, s.gz, s.t, s.d_left, s.d_front, s.d_right, s.d_back, age_ms
                );
            }
            if let Some(image) = operator.image_data().await {
                tracing::debug!("Operator: last image {} bytes", image.jpeg.len());
            }
        }
    }

    operator.stop()?;
    operator.close().await;
    Ok(())
}

async fn connect_with_retry(url: &str) -> anyhow::Result<OperatorClient> {
    let mut attempts = 0;
    loop {
        match OperatorClient::connect(url).await {
            Ok(client) => return Ok(client),
            Err(e) if attempts < 10 => {
                attempts += 1;
                tracing::debug!("Operator connect failed ({}), retrying", e);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
