//! Zenoh bridge for OPC UA.
//!
//! This bridge connects to an OPC UA server, establishes a monitored-item
//! subscription for a configured set of nodes, and republishes every value
//! change to Zenoh. The connection/session/subscription chain is rebuilt
//! from scratch whenever the transport drops.
//!
//! # Topics
//!
//! ```text
//! /opcua/<server>/node/<point>
//! ```
//!
//! Where:
//! - `<server>` - Server name from configuration
//! - `<point>` - Semantic point name from configuration
//!
//! Payloads are flat JSON documents
//! `{"id": <node id>, "value": <raw value>, "timestamp": <source timestamp>}`.

pub mod bus;
pub mod client;
pub mod config;
pub mod publisher;
pub mod retry;
pub mod sim;
pub mod subscriber;

use config::{ConfigError, LogFormat, LoggingConfig};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
        }
    }

    Ok(())
}
