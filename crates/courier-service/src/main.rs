//! # Courier Service
//!
//! Binary entry point for the Courier webhook service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes structured logging
//! - Wires the event receiver with the default handler set
//! - Starts the HTTP server from courier-api

mod handlers;

use courier_api::{build_receiver, load_config, start_server, LoggingConfig};
use courier_core::TokioExecutor;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration decides the log format, so load it first and report any
    // failure once logging is up.
    let loaded = load_config();
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    info!("Starting Courier Service");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    let executor = TokioExecutor::new();
    let registry = Arc::new(handlers::default_registry());

    let receiver = match build_receiver(&config, registry, Arc::new(executor.clone())) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %config.server.host,
        port = config.server.port,
        endpoint = %config.webhooks.endpoint_path,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(config, receiver, executor).await {
        error!("Failed to start server: {}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let level = &logging.level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "courier_service={level},courier_api={level},courier_core={level},tower_http=debug"
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
