//! Adaptive Health Polling Daemon
//!
//! Polls a fixed set of service health endpoints on a cadence that adapts to
//! each service's last status, host visibility, battery, and network quality.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐   env changes   ┌──────────────────────────────────────┐
//!   │ environment  │────────────────▶│  health::scheduler (one per service) │
//!   │ host/battery │                 └──────────────────┬───────────────────┘
//!   └──────▲───────┘                                    │
//!          │ POST /admin/environment                    ▼
//!   ┌──────┴───────┐   refresh       ┌──────────────────────────────────────┐
//!   │    admin     │────────────────▶│  health::poller                      │
//!   │  (axum API)  │                 │  breaker gate → probe → classify     │
//!   └──────▲───────┘                 └──────────────────┬───────────────────┘
//!          │ GET /admin/health                          ▼
//!          │                         ┌──────────────────────────────────────┐
//!          └─────────────────────────│  health::store (snapshot + events)   │
//!                                    └──────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use health_poller::admin::{setup_admin_router, AdminState};
use health_poller::config::load_config;
use health_poller::environment::HostEnvironment;
use health_poller::health::HealthEngine;
use health_poller::lifecycle::{wait_for_signal, Shutdown};
use health_poller::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "health-poller")]
#[command(about = "Adaptive health polling daemon", long_about = None)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, env = "HEALTH_POLLER_CONFIG", default_value = "health-poller.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("health-poller v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        services = config.services.len(),
        admin_enabled = config.admin.enabled,
        metrics_enabled = config.observability.metrics_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let environment = Arc::new(HostEnvironment::from_config(&config.environment));
    let battery_monitor = config.environment.battery_path.as_ref().map(|path| {
        environment.spawn_battery_monitor(
            PathBuf::from(path),
            Duration::from_secs(config.environment.battery_refresh_secs),
            shutdown.subscribe(),
        )
    });

    let engine = Arc::new(HealthEngine::from_config(&config, environment.clone())?);
    engine.start(&shutdown)?;

    let admin_server = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let state = AdminState::new(engine.clone(), environment.clone(), &config.admin.api_key);
        let router = setup_admin_router(state);
        let admin_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { admin_shutdown.wait().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin server failed");
            }
        }))
    } else {
        None
    };

    wait_for_signal(&shutdown).await;

    engine.stop().await;
    if let Some(handle) = admin_server {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Admin server task failed to join");
        }
    }
    if let Some(handle) = battery_monitor {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Battery monitor task failed to join");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
