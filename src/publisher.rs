//! Telemetry publisher: topic construction, payload serialization, bus handoff.
//!
//! Delivery is at-most-once by design: a failed publish is logged, counted,
//! and dropped. The server-side discard-oldest queue already accepts loss
//! under backpressure, so buffering here would buy nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::bus::BusClient;
use crate::client::ChangeNotification;

/// Constant namespace segment of the outbound topic template.
pub const TOPIC_NAMESPACE: &str = "opcua";

/// Build the bus topic for a node value change.
pub fn node_topic(server: &str, point: &str) -> String {
    format!("/{}/{}/node/{}", TOPIC_NAMESPACE, server, point)
}

/// Flat payload published for each value change. The `id` carries the
/// wire-level node identifier, not the friendly point name.
#[derive(Debug, Serialize)]
struct NodePayload<'a> {
    id: &'a str,
    value: &'a serde_json::Value,
    timestamp: &'a DateTime<Utc>,
}

/// Publishes value changes to the message bus.
pub struct TelemetryPublisher<B> {
    bus: B,
    server_name: String,
    published: AtomicU64,
    failed: AtomicU64,
}

impl<B: BusClient> TelemetryPublisher<B> {
    /// Create a publisher for one server.
    pub fn new(bus: B, server_name: impl Into<String>) -> Self {
        Self {
            bus,
            server_name: server_name.into(),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Publish one value change under the given point name.
    ///
    /// Never fails from the caller's point of view; errors are logged and
    /// counted.
    pub async fn publish_change(&self, point_name: &str, change: &ChangeNotification) {
        let topic = node_topic(&self.server_name, point_name);

        let payload = NodePayload {
            id: &change.node_id,
            value: &change.value,
            timestamp: &change.source_timestamp,
        };

        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Failed to serialize node change");
                self.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        match self.bus.publish(&topic, bytes).await {
            Ok(()) => {
                debug!(topic = %topic, value = %change.value, "Published node change");
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Failed to publish node change");
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of successfully published changes.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of dropped changes.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
