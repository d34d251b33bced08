//! Configuration for the OPC UA bridge.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcuaBridgeConfig {
    /// Zenoh connection settings
    pub zenoh: ZenohConfig,

    /// OPC UA-specific settings
    pub opcua: OpcuaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OPC UA protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcuaConfig {
    /// The server to connect to
    pub server: ServerConfig,

    /// Nodes to monitor for value changes
    pub subscriptions: Vec<MonitoredPointConfig>,

    /// Session credentials
    #[serde(default)]
    pub auth: Credentials,

    /// Client connection behaviour
    #[serde(default)]
    pub client: ClientOptions,

    /// Subscription negotiation parameters
    #[serde(default)]
    pub subscription: SubscriptionParams,

    /// Per-item monitoring parameters
    #[serde(default)]
    pub monitoring: MonitoringParams,
}

/// Identity of one OPC UA server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name (used in bus topics)
    pub name: String,

    /// Endpoint URL (e.g., "opc.tcp://localhost:26543")
    pub url: String,
}

/// One data point of interest on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredPointConfig {
    /// Semantic point name (used in bus topics)
    pub name: String,

    /// Wire-level node identifier (e.g., "ns=1;s=PumpSpeed")
    pub node_id: String,
}

/// Session credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    /// Anonymous session (default)
    #[default]
    Anonymous,
    /// Username/password authentication
    UserName { username: String, password: String },
}

/// Client connection behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Keep the session alive with periodic reads
    #[serde(default = "default_keep_session_alive")]
    pub keep_session_alive: bool,

    /// Reconnect backoff settings
    #[serde(default)]
    pub connection_strategy: ConnectionStrategy,
}

fn default_keep_session_alive() -> bool {
    true
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            keep_session_alive: default_keep_session_alive(),
            connection_strategy: ConnectionStrategy::default(),
        }
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStrategy {
    /// Retries allowed after the initial attempt before the bridge halts
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the backoff delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retry() -> u32 {
    100_000
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for ConnectionStrategy {
    fn default() -> Self {
        Self {
            max_retry: default_max_retry(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Subscription negotiation parameters sent to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionParams {
    /// Requested publishing interval in milliseconds
    #[serde(default = "default_publishing_interval_ms")]
    pub publishing_interval_ms: u64,

    /// Requested lifetime count
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Requested max keep-alive count
    #[serde(default = "default_max_keep_alive_count")]
    pub max_keep_alive_count: u32,

    /// Max notifications per publish response
    #[serde(default = "default_max_notifications_per_publish")]
    pub max_notifications_per_publish: u32,

    /// Whether publishing is enabled immediately
    #[serde(default = "default_publishing_enabled")]
    pub publishing_enabled: bool,

    /// Subscription priority
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_publishing_interval_ms() -> u64 {
    100
}

fn default_lifetime_count() -> u32 {
    1_000
}

fn default_max_keep_alive_count() -> u32 {
    12
}

fn default_max_notifications_per_publish() -> u32 {
    10
}

fn default_publishing_enabled() -> bool {
    true
}

fn default_priority() -> u8 {
    10
}

impl Default for SubscriptionParams {
    fn default() -> Self {
        Self {
            publishing_interval_ms: default_publishing_interval_ms(),
            lifetime_count: default_lifetime_count(),
            max_keep_alive_count: default_max_keep_alive_count(),
            max_notifications_per_publish: default_max_notifications_per_publish(),
            publishing_enabled: default_publishing_enabled(),
            priority: default_priority(),
        }
    }
}

/// Per-item monitoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringParams {
    /// Sampling interval in milliseconds
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,

    /// Server-side notification queue depth
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Drop the oldest queued notification on overflow
    #[serde(default = "default_discard_oldest")]
    pub discard_oldest: bool,
}

fn default_sampling_interval_ms() -> u64 {
    250
}

fn default_queue_size() -> u32 {
    10_000
}

fn default_discard_oldest() -> bool {
    true
}

impl Default for MonitoringParams {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval_ms(),
            queue_size: default_queue_size(),
            discard_oldest: default_discard_oldest(),
        }
    }
}

/// Common Zenoh connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "peer".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl OpcuaBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: OpcuaBridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.opcua.server.name.is_empty() {
            return Err(ConfigError::Validation(
                "Server name cannot be empty".to_string(),
            ));
        }

        if !self.opcua.server.url.starts_with("opc.tcp://") {
            return Err(ConfigError::Validation(format!(
                "Server '{}': url must use the opc.tcp:// scheme",
                self.opcua.server.name
            )));
        }

        if self.opcua.subscriptions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one subscription must be configured".to_string(),
            ));
        }

        for point in &self.opcua.subscriptions {
            if point.name.is_empty() {
                return Err(ConfigError::Validation(
                    "Subscription name cannot be empty".to_string(),
                ));
            }

            if point.node_id.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Subscription '{}': node_id cannot be empty",
                    point.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{
            zenoh: { mode: "peer" },
            opcua: {
                server: { name: "server", url: "opc.tcp://localhost:26543" },
                subscriptions: [
                    { name: "MyPumpSpeed", node_id: "ns=1;s=PumpSpeed" }
                ]
            }
        }"#;

        let config: OpcuaBridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.opcua.server.name, "server");
        assert_eq!(config.opcua.server.url, "opc.tcp://localhost:26543");
        assert_eq!(config.opcua.subscriptions.len(), 1);
        assert_eq!(config.opcua.subscriptions[0].name, "MyPumpSpeed");
        assert_eq!(config.opcua.subscriptions[0].node_id, "ns=1;s=PumpSpeed");
    }

    #[test]
    fn test_parameter_defaults() {
        let json = r#"{
            zenoh: { mode: "peer" },
            opcua: {
                server: { name: "server", url: "opc.tcp://localhost:26543" },
                subscriptions: [
                    { name: "MyPumpSpeed", node_id: "ns=1;s=PumpSpeed" }
                ]
            }
        }"#;

        let config: OpcuaBridgeConfig = json5::from_str(json).unwrap();

        assert!(config.opcua.client.keep_session_alive);
        assert_eq!(config.opcua.client.connection_strategy.max_retry, 100_000);
        assert_eq!(
            config.opcua.client.connection_strategy.initial_delay_ms,
            2_000
        );
        assert_eq!(config.opcua.client.connection_strategy.max_delay_ms, 10_000);

        assert_eq!(config.opcua.subscription.publishing_interval_ms, 100);
        assert_eq!(config.opcua.subscription.lifetime_count, 1_000);
        assert_eq!(config.opcua.subscription.max_keep_alive_count, 12);
        assert_eq!(config.opcua.subscription.max_notifications_per_publish, 10);
        assert!(config.opcua.subscription.publishing_enabled);
        assert_eq!(config.opcua.subscription.priority, 10);

        assert_eq!(config.opcua.monitoring.sampling_interval_ms, 250);
        assert_eq!(config.opcua.monitoring.queue_size, 10_000);
        assert!(config.opcua.monitoring.discard_oldest);

        assert!(matches!(config.opcua.auth, Credentials::Anonymous));
    }

    #[test]
    fn test_parse_auth_and_strategy_overrides() {
        let json = r#"{
            zenoh: { mode: "client", connect: ["tcp/127.0.0.1:7447"] },
            opcua: {
                server: { name: "plant", url: "opc.tcp://10.0.0.5:4840" },
                subscriptions: [
                    { name: "Temperature", node_id: "ns=2;s=Temp" }
                ],
                auth: { type: "username", username: "operator", password: "secret" },
                client: {
                    connection_strategy: { max_retry: 5, initial_delay_ms: 100, max_delay_ms: 800 }
                }
            }
        }"#;

        let config: OpcuaBridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert!(matches!(
            config.opcua.auth,
            Credentials::UserName { ref username, .. } if username == "operator"
        ));
        assert_eq!(config.opcua.client.connection_strategy.max_retry, 5);
        assert_eq!(config.opcua.client.connection_strategy.max_delay_ms, 800);
        assert_eq!(config.zenoh.connect, vec!["tcp/127.0.0.1:7447"]);
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let json = r#"{
            zenoh: { mode: "peer" },
            opcua: {
                server: { name: "server", url: "http://localhost:26543" },
                subscriptions: [
                    { name: "MyPumpSpeed", node_id: "ns=1;s=PumpSpeed" }
                ]
            }
        }"#;

        let config: OpcuaBridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_subscriptions() {
        let json = r#"{
            zenoh: { mode: "peer" },
            opcua: {
                server: { name: "server", url: "opc.tcp://localhost:26543" },
                subscriptions: []
            }
        }"#;

        let config: OpcuaBridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_node_id() {
        let json = r#"{
            zenoh: { mode: "peer" },
            opcua: {
                server: { name: "server", url: "opc.tcp://localhost:26543" },
                subscriptions: [
                    { name: "MyPumpSpeed", node_id: "" }
                ]
            }
        }"#;

        let config: OpcuaBridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }
}
