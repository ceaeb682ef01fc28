//! Stats gateway process.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                STATS GATEWAY                 │
//!                 │                                              │
//!   caller ──────▶│  DomainServices ──▶ CacheCascade<E>          │
//!                 │        │              local (moka)           │
//!                 │        │              distributed (redis)    │
//!                 │        │              durable (postgres)     │
//!                 │        ▼                                     │
//!                 │  UpstreamGatewayClient ─────────────────────┼──▶ Riot API
//!                 │    rate limiter → breaker → retry            │
//!                 │  ResourceClient (retry) ────────────────────┼──▶ community CDN
//!                 │                                              │
//!   operator ────▶│  admin (status, flush)                       │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use stats_gateway::admin::{self, AdminState};
use stats_gateway::cache::CacheTiers;
use stats_gateway::config::{load_or_default, ConfigSource};
use stats_gateway::lifecycle::{wait_for_signal, Shutdown};
use stats_gateway::observability::{logging, metrics};
use stats_gateway::upstream::ResourceClient;
use stats_gateway::{DomainServices, UpstreamGatewayClient};

#[derive(Parser)]
#[command(name = "stats-gateway")]
#[command(about = "Cached, rate-limited gateway to the Riot API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let (config, source) = load_or_default(&args.config)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stats-gateway starting");
    match source {
        ConfigSource::File => tracing::info!(path = %args.config.display(), "Configuration loaded"),
        ConfigSource::Defaults => {
            tracing::info!(path = %args.config.display(), "Config file not found, using defaults")
        }
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // 1. Upstream client
    let gateway = Arc::new(UpstreamGatewayClient::from_config(&config)?);
    tracing::info!(
        windows = config.rate_limit.windows.len(),
        fail_max = config.circuit_breaker.fail_max,
        retry_attempts = config.retry.max_attempts,
        "Upstream client ready"
    );

    // 2. Cache tiers and services
    let tiers = CacheTiers::from_config(&config.cache).await?;
    let resources = Arc::new(ResourceClient::from_config(&config)?);
    let services = DomainServices::new(gateway.clone(), resources, &tiers);
    services.warm_catalogs().await;

    // 3. Admin surface
    let shutdown = Shutdown::new();
    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            tiers: tiers.clone(),
            gateway: gateway.clone(),
        };
        Some(tokio::spawn(admin::serve(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    wait_for_signal().await;
    shutdown.trigger();

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
            Err(e) => tracing::error!(error = %e, "Admin task panicked"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
