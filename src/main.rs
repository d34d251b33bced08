//! Zenoh bridge for OPC UA.
//!
//! This bridge subscribes to monitored nodes on an OPC UA server and
//! publishes value changes to Zenoh.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};
use zenoh_bridge_opcua::bus;
use zenoh_bridge_opcua::config::{LoggingConfig, OpcuaBridgeConfig};
use zenoh_bridge_opcua::publisher::TelemetryPublisher;
use zenoh_bridge_opcua::sim::SimClient;
use zenoh_bridge_opcua::subscriber::OpcuaSubscriber;

/// Zenoh bridge for OPC UA.
#[derive(Parser, Debug)]
#[command(name = "zenoh-bridge-opcua")]
#[command(about = "Subscribes to OPC UA nodes and publishes value changes to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "opcua.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = OpcuaBridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    zenoh_bridge_opcua::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting zenoh-bridge-opcua");
    info!("Loaded configuration from {:?}", args.config);

    // Connect to Zenoh
    info!("Connecting to Zenoh...");
    let session = bus::connect(&config.zenoh)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Zenoh: {}", e))?;
    info!("Connected to Zenoh");

    // Wire the lifecycle machine to its client backend. The shipped backend
    // is the simulator; a real OPC UA stack plugs in through the same
    // ProtocolClient seam.
    let (events_tx, events_rx) = mpsc::channel(1024);
    let client = SimClient::new(events_tx);
    let publisher = TelemetryPublisher::new(session.clone(), config.opcua.server.name.clone());
    let subscriber = OpcuaSubscriber::new(client, events_rx, publisher, config.opcua.clone());

    info!(
        server = %config.opcua.server.name,
        url = %config.opcua.server.url,
        nodes = config.opcua.subscriptions.len(),
        "Starting OPC UA subscriber"
    );
    let bridge = tokio::spawn(subscriber.run());

    // Publish bridge status
    let status_key = format!("opcua/{}/@/status", config.opcua.server.name);
    let status = serde_json::json!({
        "bridge": "opcua",
        "version": env!("CARGO_PKG_VERSION"),
        "server": config.opcua.server.name,
        "nodes": config.opcua.subscriptions.iter().map(|s| &s.name).collect::<Vec<_>>(),
        "status": "running"
    });

    if let Err(e) = session.put(&status_key, status.to_string()).await {
        error!("Failed to publish bridge status: {}", e);
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    bridge.abort();

    // Publish offline status
    let status = serde_json::json!({
        "bridge": "opcua",
        "status": "offline"
    });
    let _ = session.put(&status_key, status.to_string()).await;

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close Zenoh session: {}", e))?;
    info!("OPC UA bridge stopped");

    Ok(())
}
