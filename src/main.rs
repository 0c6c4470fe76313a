//! Arbor daemon binary
//!
//! Loads configuration, creates the router actor and logs tree events
//! until interrupted. Transports register peers through the library API.

use arbor::{Config, Router};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Arbor overlay routing daemon
#[derive(Parser, Debug)]
#[command(name = "arbord", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    info!("arbord starting");

    // Load configuration
    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    // Create identity
    if config.has_identity() {
        info!("Using configured identity");
    } else {
        warn!("No identity configured, generating ephemeral keypair");
    }
    let identity = match config.create_identity() {
        Ok(identity) => identity,
        Err(e) => {
            error!("Failed to create identity: {}", e);
            std::process::exit(1);
        }
    };
    info!(key = %identity.node_key(), "Identity ready");

    // Spawn the router actor and follow its events
    let router = Router::new(identity, &config);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let state = match router.subscribe(event_tx).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to subscribe to router events: {}", e);
            std::process::exit(1);
        }
    };
    info!(key = %state.key, coords = %state.coords, "Router running");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
            event = event_rx.recv() => match event {
                Some(event) => info!(?event, "tree event"),
                None => {
                    warn!("Router event stream closed");
                    break;
                }
            },
        }
    }

    if let Err(e) = router.shutdown().await {
        warn!("Router already stopped: {}", e);
    }
    info!("arbord stopped");
}
