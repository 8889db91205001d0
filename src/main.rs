/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file main.rs
 * @brief DocWire server entry point
 */

use std::sync::Arc;

use anyhow::{Context, Result};
use docwire::{
    docwire_info, init_tracing_logger, CommandRegistry, Config, DocWireServer, InMemoryBackend,
    NullMetaQueryProcessor, RequestProcessor,
};
use docwire::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = Config::load(&config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    config.apply_env()?;
    config.validate()?;

    init_tracing_logger(config.logging.log_level()?, config.logging.detailed)?;
    docwire_info!("DocWire {} starting (config: {})", env!("CARGO_PKG_VERSION"), config_path);

    // A duplicate command key is a startup failure.
    let registry = CommandRegistry::standard().context("Invalid command registry")?;
    info!("Command registry ready with {} commands", registry.len());

    let processor = RequestProcessor::new(
        Arc::new(registry),
        Arc::new(InMemoryBackend::new().with_max_message_size(config.server.max_message_size)),
        Arc::new(NullMetaQueryProcessor),
    );

    let server = DocWireServer::new(config.server.clone(), processor);
    let shutdown = server.shutdown_sender();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                let _ = shutdown.send(());
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    server.start().await?;
    docwire_info!("DocWire stopped");
    Ok(())
}
