//! The OPC UA protocol-client capability driven by the bridge.
//!
//! Wire encoding lives entirely behind [`ProtocolClient`]; the bridge core
//! only issues the lifecycle requests below and consumes typed
//! [`ClientEvent`]s from a channel. Requests return `Ok(())` when the
//! operation was accepted; the outcome always arrives asynchronously as an
//! event, because the underlying transport is event-driven.

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

use crate::config::{Credentials, MonitoringParams, SubscriptionParams};

/// Contract violations and transport faults reported by a client backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No live connection")]
    NotConnected,
    #[error("No active session")]
    NoSession,
    #[error("No active subscription")]
    NoSubscription,
    #[error("Transport error: {0}")]
    Transport(String),
}

/// One observed value change on a monitored node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    /// Wire-level node identifier
    pub node_id: String,
    /// The sampled value
    pub value: serde_json::Value,
    /// Timestamp assigned by the data source
    pub source_timestamp: DateTime<Utc>,
}

/// Asynchronous outcomes and notifications emitted by a client backend.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A connection attempt succeeded.
    Connected,
    /// A connection attempt failed.
    ConnectFailed { reason: String },
    /// An established connection was lost.
    Disconnected { reason: String },
    /// A session was created and authenticated.
    SessionCreated { session_id: String },
    /// The server rejected session creation.
    SessionFailed { reason: String },
    /// The subscription is live on the server.
    SubscriptionStarted { subscription_id: u32 },
    /// The server rejected the subscription parameters.
    SubscriptionFailed { reason: String },
    /// Transport-level fault inside the subscription. Informational only;
    /// fatal faults surface through [`ClientEvent::Disconnected`].
    SubscriptionInternalError { message: String },
    /// Server-reported subscription state transition. Informational only.
    SubscriptionStatusChanged { status: String },
    /// A monitored-item registration was acknowledged.
    ItemInitialized { node_id: String },
    /// A new sample arrived for a monitored item.
    ItemChanged(ChangeNotification),
    /// An item-level fault; the item stays registered.
    ItemError { node_id: String, message: String },
}

/// Narrow interface to an OPC UA client stack.
///
/// Each request requires its parent entity to be live: `create_session` a
/// connection, `create_subscription` a session, `monitor_item` a
/// subscription. Calling out of order is a contract violation and fails
/// immediately with the matching [`ClientError`]; recovery ordering is the
/// caller's job.
pub trait ProtocolClient: Send {
    /// Start an asynchronous connection attempt to `url`.
    fn connect(&mut self, url: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Request an authenticated session on the live connection.
    fn create_session(
        &mut self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Request a streaming subscription on the live session.
    fn create_subscription(
        &mut self,
        params: &SubscriptionParams,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Register one monitored item on the live subscription, reading the
    /// value attribute with both source and server timestamps.
    fn monitor_item(
        &mut self,
        node_id: &str,
        params: &MonitoringParams,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Discard all session/subscription/item state after a disconnect so the
    /// next cycle starts from scratch.
    fn reset(&mut self) -> impl Future<Output = ()> + Send;

    /// Tear the connection down for good at shutdown.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}
