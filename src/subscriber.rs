//! Lifecycle orchestrator for the OPC UA connection chain.
//!
//! Drives connect → session → subscription → monitored items as an explicit
//! state machine over typed [`ClientEvent`]s. Every failure below an
//! established connection restarts the chain from the connection layer;
//! nothing is resumed partially. While `Monitoring`, value changes are
//! mapped to their configured point names and handed to the publisher.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::BusClient;
use crate::client::{ClientEvent, ProtocolClient};
use crate::config::OpcuaConfig;
use crate::publisher::TelemetryPublisher;
use crate::retry::RetryPolicy;

/// Lifecycle states of the bridge.
///
/// `Monitoring` is the only steady state; `Failed` is terminal and only
/// reached when the connection retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Connecting,
    Connected,
    SessionPending,
    SessionActive,
    SubscriptionPending,
    SubscriptionActive,
    Monitoring,
    Failed,
}

impl BridgeState {
    /// True for states with a live transport connection underneath.
    fn connected(self) -> bool {
        matches!(
            self,
            BridgeState::Connected
                | BridgeState::SessionPending
                | BridgeState::SessionActive
                | BridgeState::SubscriptionPending
                | BridgeState::SubscriptionActive
                | BridgeState::Monitoring
        )
    }
}

/// Bridges one OPC UA server to the message bus.
pub struct OpcuaSubscriber<C, B> {
    client: C,
    events: mpsc::Receiver<ClientEvent>,
    publisher: TelemetryPublisher<B>,
    config: OpcuaConfig,
    policy: RetryPolicy,
    state: BridgeState,
    /// Consecutive failed connection attempts; cleared on success.
    failures: u32,
    /// Node id → point name for the current cycle. Rebuilt from scratch on
    /// every reconnect.
    registry: HashMap<String, String>,
}

impl<C, B> OpcuaSubscriber<C, B>
where
    C: ProtocolClient,
    B: BusClient,
{
    /// Create a subscriber over an injected client backend and publisher.
    pub fn new(
        client: C,
        events: mpsc::Receiver<ClientEvent>,
        publisher: TelemetryPublisher<B>,
        config: OpcuaConfig,
    ) -> Self {
        let policy = RetryPolicy::from_strategy(&config.client.connection_strategy);

        Self {
            client,
            events,
            publisher,
            config,
            policy,
            state: BridgeState::Idle,
            failures: 0,
            registry: HashMap::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// The publisher this subscriber feeds.
    pub fn publisher(&self) -> &TelemetryPublisher<B> {
        &self.publisher
    }

    /// Run the bridge until the retry budget is exhausted or the client
    /// backend goes away.
    pub async fn run(mut self) {
        loop {
            match self.state {
                BridgeState::Idle => self.begin_cycle().await,
                BridgeState::Failed => break,
                _ => {
                    let Some(event) = self.events.recv().await else {
                        warn!("Client event channel closed; stopping bridge");
                        break;
                    };
                    self.apply(event).await;
                }
            }
        }

        if self.state == BridgeState::Failed {
            error!(
                server = %self.config.server.name,
                "Bridge halted after exhausting connection retries"
            );
        }

        self.client.disconnect().await;
    }

    /// Start a connection attempt, backing off first if previous attempts
    /// failed.
    async fn begin_cycle(&mut self) {
        if self.failures > 0 {
            let delay = self.policy.delay_for(self.failures);
            debug!(
                retry = self.failures,
                delay_ms = delay.as_millis() as u64,
                "Backing off before reconnect"
            );
            tokio::time::sleep(delay).await;
        }

        self.state = BridgeState::Connecting;
        info!(
            server = %self.config.server.name,
            url = %self.config.server.url,
            "Connecting to OPC UA server"
        );

        if let Err(e) = self.client.connect(&self.config.server.url).await {
            warn!(error = %e, "Connection attempt could not be started");
            self.record_connect_failure();
        }
    }

    fn record_connect_failure(&mut self) {
        self.failures += 1;
        if self.policy.exhausted(self.failures) {
            self.state = BridgeState::Failed;
        } else {
            self.state = BridgeState::Idle;
        }
    }

    /// Apply one client event to the state machine.
    async fn apply(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected => {
                if self.state != BridgeState::Connecting {
                    debug!(state = ?self.state, "Ignoring stale Connected event");
                    return;
                }
                self.failures = 0;
                self.state = BridgeState::Connected;
                info!(server = %self.config.server.name, "Connected");
                self.request_session().await;
            }
            ClientEvent::ConnectFailed { reason } => {
                if self.state != BridgeState::Connecting {
                    return;
                }
                warn!(error = %reason, "Connection attempt failed");
                self.record_connect_failure();
            }
            ClientEvent::Disconnected { reason } => {
                if !self.state.connected() {
                    return;
                }
                warn!(error = %reason, "Lost connection; restarting from connect");
                self.teardown().await;
            }
            ClientEvent::SessionCreated { session_id } => {
                if self.state != BridgeState::SessionPending {
                    debug!(state = ?self.state, "Ignoring stale SessionCreated event");
                    return;
                }
                info!(session = %session_id, "Session created");
                self.state = BridgeState::SessionActive;
                self.request_subscription().await;
            }
            ClientEvent::SessionFailed { reason } => {
                if self.state != BridgeState::SessionPending {
                    return;
                }
                warn!(error = %reason, "Session creation rejected; restarting from connect");
                self.teardown().await;
            }
            ClientEvent::SubscriptionStarted { subscription_id } => {
                if self.state != BridgeState::SubscriptionPending {
                    debug!(state = ?self.state, "Ignoring stale SubscriptionStarted event");
                    return;
                }
                info!(subscription = subscription_id, "Subscription started");
                self.state = BridgeState::SubscriptionActive;
                self.register_items().await;
            }
            ClientEvent::SubscriptionFailed { reason } => {
                if self.state != BridgeState::SubscriptionPending {
                    return;
                }
                warn!(error = %reason, "Subscription rejected; restarting from connect");
                self.teardown().await;
            }
            ClientEvent::SubscriptionInternalError { message } => {
                warn!(error = %message, "Subscription internal error");
            }
            ClientEvent::SubscriptionStatusChanged { status } => {
                info!(status = %status, "Subscription status changed");
            }
            ClientEvent::ItemInitialized { node_id } => {
                debug!(node = %node_id, "Monitored item initialized");
            }
            ClientEvent::ItemChanged(change) => {
                if self.state != BridgeState::Monitoring {
                    debug!(node = %change.node_id, "Dropping change outside Monitoring");
                    return;
                }
                match self.registry.get(&change.node_id) {
                    Some(name) => self.publisher.publish_change(name, &change).await,
                    None => {
                        warn!(node = %change.node_id, "Change for unregistered node");
                    }
                }
            }
            ClientEvent::ItemError { node_id, message } => {
                warn!(node = %node_id, error = %message, "Monitored item error");
            }
        }
    }

    async fn request_session(&mut self) {
        self.state = BridgeState::SessionPending;
        if let Err(e) = self.client.create_session(&self.config.auth).await {
            warn!(error = %e, "Could not request session; restarting from connect");
            self.teardown().await;
        }
    }

    async fn request_subscription(&mut self) {
        self.state = BridgeState::SubscriptionPending;
        if let Err(e) = self
            .client
            .create_subscription(&self.config.subscription)
            .await
        {
            warn!(error = %e, "Could not request subscription; restarting from connect");
            self.teardown().await;
        }
    }

    /// Register every configured point on the live subscription. Failures
    /// are isolated per item; siblings still get registered.
    async fn register_items(&mut self) {
        self.registry.clear();

        for point in &self.config.subscriptions {
            info!(node = %point.node_id, name = %point.name, "Registering monitored item");
            if let Err(e) = self
                .client
                .monitor_item(&point.node_id, &self.config.monitoring)
                .await
            {
                warn!(node = %point.node_id, error = %e, "Failed to register monitored item");
                continue;
            }
            self.registry
                .insert(point.node_id.clone(), point.name.clone());
        }

        self.state = BridgeState::Monitoring;
        info!(items = self.registry.len(), "Monitoring");
    }

    /// Discard the whole session/subscription/item chain and go back to the
    /// connection layer. A short pause keeps a flapping server from driving
    /// a hot reconnect loop.
    async fn teardown(&mut self) {
        self.client.reset().await;
        self.registry.clear();
        self.state = BridgeState::Idle;
        tokio::time::sleep(self.policy.initial_delay()).await;
    }
}
