//! Route Gateway
//!
//! An API gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────────┐
//!                     │                    ROUTE GATEWAY                    │
//!                     │                                                    │
//!  Client Request     │  ┌────────┐   ┌──────────┐   ┌───────────────┐     │
//!  ───────────────────┼─▶│  http  │──▶│ gateway  │──▶│   routing     │     │
//!                     │  │ server │   │  engine  │   │ (predicates)  │     │
//!                     │  └────────┘   └────┬─────┘   └───────────────┘     │
//!                     │                    │                               │
//!                     │                    ▼                               │
//!                     │             ┌─────────────┐   ┌──────────────┐     │
//!                     │             │filter chain │──▶│circuit breaker│    │
//!                     │             └─────────────┘   └──────┬───────┘     │
//!                     │                                      │             │
//!  Client Response    │  ┌────────┐   ┌──────────┐   ┌──────▼───────┐     │
//!  ◀──────────────────┼──│  http  │◀──│ response │◀──│ proxy client │◀────┼── Upstream
//!                     │  │ server │   │ filters  │   │  / fallback  │     │
//!                     │  └────────┘   └──────────┘   └──────────────┘     │
//!                     │                                                    │
//!                     │  config (load, validate, watch) · observability    │
//!                     │  lifecycle (signals, graceful shutdown) · admin    │
//!                     └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use route_gateway::config::watcher::ConfigWatcher;
use route_gateway::config::{load_config, GatewayConfig};
use route_gateway::lifecycle::signals::wait_for_signal;
use route_gateway::observability::{logging, metrics};
use route_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "route-gateway", version, about = "Predicate-routing API gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Reload routes when the configuration file changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        GatewayConfig::default()
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "route-gateway starting");
    if !args.config.exists() {
        tracing::warn!(path = ?args.config, "Config file not found, using defaults");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        endpoints = config.endpoints.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = if args.watch {
        let (watcher, updates) = ConfigWatcher::new(&args.config);
        (updates, Some(watcher.run()?))
    } else {
        let (_, updates) = mpsc::unbounded_channel();
        (updates, None)
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => shutdown.trigger(),
            Err(err) => tracing::error!(error = %err, "Failed to listen for shutdown signals"),
        }
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
