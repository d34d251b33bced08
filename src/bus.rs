//! Zenoh session establishment and the message-bus capability.

use std::future::Future;
use thiserror::Error;
use zenoh::Session;

use crate::config::ZenohConfig;

/// Message-bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Zenoh error: {0}")]
    Zenoh(String),
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },
}

/// Narrow interface to the message bus the bridge publishes through.
///
/// Shared read-only by the publisher; delivery is best-effort and the
/// caller decides what a failure means.
pub trait BusClient: Send + Sync {
    /// Publish a payload to a topic.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), BusError>> + Send;
}

impl BusClient for Session {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        // Zenoh key expressions cannot start with '/'; the slash stays part
        // of the bus topic contract and is only stripped at this boundary.
        let key = topic.trim_start_matches('/');
        self.put(key, payload)
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

/// Connect to Zenoh using the provided configuration.
pub async fn connect(config: &ZenohConfig) -> Result<Session, BusError> {
    let mut zenoh_config = zenoh::Config::default();

    // Set mode
    let mode_str = match config.mode.as_str() {
        "client" | "peer" | "router" => format!("\"{}\"", config.mode),
        other => {
            return Err(BusError::Config(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                other
            )));
        }
    };

    zenoh_config
        .insert_json5("mode", &mode_str)
        .map_err(|e| BusError::Config(format!("Failed to set mode: {}", e)))?;

    // Set connect endpoints
    if !config.connect.is_empty() {
        let endpoints_json = serde_json::to_string(&config.connect)
            .map_err(|e| BusError::Config(format!("Failed to serialize connect endpoints: {}", e)))?;

        zenoh_config
            .insert_json5("connect/endpoints", &endpoints_json)
            .map_err(|e| BusError::Config(format!("Failed to set connect endpoints: {}", e)))?;
    }

    // Set listen endpoints
    if !config.listen.is_empty() {
        let endpoints_json = serde_json::to_string(&config.listen)
            .map_err(|e| BusError::Config(format!("Failed to serialize listen endpoints: {}", e)))?;

        zenoh_config
            .insert_json5("listen/endpoints", &endpoints_json)
            .map_err(|e| BusError::Config(format!("Failed to set listen endpoints: {}", e)))?;
    }

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| BusError::Zenoh(e.to_string()))?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}
