//! Simulated OPC UA backend for development and demo runs.
//!
//! Stands in for a real protocol stack behind
//! [`ProtocolClient`](crate::client::ProtocolClient): acknowledges the
//! lifecycle requests and synthesizes a smooth sinusoidal value stream for
//! each monitored node at the configured sampling interval. A production
//! deployment swaps in a backend that talks to a real server.

use std::f64::consts::TAU;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::debug;

use crate::client::{ChangeNotification, ClientError, ClientEvent, ProtocolClient};
use crate::config::{Credentials, MonitoringParams, SubscriptionParams};

/// Samples per full period of the simulated waveform.
const SAMPLES_PER_PERIOD: f64 = 40.0;

/// Simulated protocol client.
pub struct SimClient {
    events: mpsc::Sender<ClientEvent>,
    /// Connection attempts that are refused before one succeeds.
    fail_first_connects: u32,
    attempts: u32,
    connected: bool,
    session_live: bool,
    subscription_live: bool,
    session_counter: u32,
    subscription_counter: u32,
    items: Vec<JoinHandle<()>>,
}

impl SimClient {
    /// Create a simulated client emitting events on the given channel.
    pub fn new(events: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            events,
            fail_first_connects: 0,
            attempts: 0,
            connected: false,
            session_live: false,
            subscription_live: false,
            session_counter: 0,
            subscription_counter: 0,
            items: Vec::new(),
        }
    }

    /// Refuse the first `count` connection attempts, to exercise the
    /// reconnect path end to end.
    pub fn with_flaky_start(mut self, count: u32) -> Self {
        self.fail_first_connects = count;
        self
    }

    fn stop_items(&mut self) {
        for item in self.items.drain(..) {
            item.abort();
        }
    }
}

impl ProtocolClient for SimClient {
    async fn connect(&mut self, url: &str) -> Result<(), ClientError> {
        self.attempts += 1;
        if self.attempts <= self.fail_first_connects {
            let _ = self
                .events
                .send(ClientEvent::ConnectFailed {
                    reason: format!("simulated refusal of {}", url),
                })
                .await;
            return Ok(());
        }

        debug!(url = %url, "Simulated connection established");
        self.connected = true;
        let _ = self.events.send(ClientEvent::Connected).await;
        Ok(())
    }

    async fn create_session(&mut self, _credentials: &Credentials) -> Result<(), ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }

        self.session_counter += 1;
        self.session_live = true;
        let _ = self
            .events
            .send(ClientEvent::SessionCreated {
                session_id: format!("sim-session-{}", self.session_counter),
            })
            .await;
        Ok(())
    }

    async fn create_subscription(&mut self, params: &SubscriptionParams) -> Result<(), ClientError> {
        if !self.session_live {
            return Err(ClientError::NoSession);
        }

        debug!(
            publishing_interval_ms = params.publishing_interval_ms,
            priority = params.priority,
            "Simulated subscription accepted"
        );
        self.subscription_counter += 1;
        self.subscription_live = true;
        let _ = self
            .events
            .send(ClientEvent::SubscriptionStarted {
                subscription_id: self.subscription_counter,
            })
            .await;
        Ok(())
    }

    async fn monitor_item(
        &mut self,
        node_id: &str,
        params: &MonitoringParams,
    ) -> Result<(), ClientError> {
        if !self.subscription_live {
            return Err(ClientError::NoSubscription);
        }

        let _ = self
            .events
            .send(ClientEvent::ItemInitialized {
                node_id: node_id.to_string(),
            })
            .await;

        let events = self.events.clone();
        let node_id = node_id.to_string();
        let interval = Duration::from_millis(params.sampling_interval_ms.max(1));

        self.items.push(tokio::spawn(async move {
            let mut tick: u64 = 0;
            loop {
                tokio::time::sleep(interval).await;

                let phase = (tick as f64) / SAMPLES_PER_PERIOD;
                let value = 50.0 + 25.0 * (TAU * phase).sin();
                let value = (value * 100.0).round() / 100.0;
                tick += 1;

                let change = ChangeNotification {
                    node_id: node_id.clone(),
                    value: serde_json::json!(value),
                    source_timestamp: Utc::now(),
                };

                if events.send(ClientEvent::ItemChanged(change)).await.is_err() {
                    break;
                }
            }
        }));

        Ok(())
    }

    async fn reset(&mut self) {
        self.stop_items();
        self.connected = false;
        self.session_live = false;
        self.subscription_live = false;
    }

    async fn disconnect(&mut self) {
        self.stop_items();
        self.connected = false;
        self.session_live = false;
        self.subscription_live = false;
    }
}

impl Drop for SimClient {
    fn drop(&mut self) {
        self.stop_items();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_out_of_order_requests_are_contract_violations() {
        let (tx, _rx) = mpsc::channel(8);
        let mut client = SimClient::new(tx);

        assert!(matches!(
            client.create_session(&Credentials::Anonymous).await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client
                .create_subscription(&SubscriptionParams::default())
                .await,
            Err(ClientError::NoSession)
        ));
        assert!(matches!(
            client
                .monitor_item("ns=1;s=PumpSpeed", &MonitoringParams::default())
                .await,
            Err(ClientError::NoSubscription)
        ));
    }

    #[tokio::test]
    async fn test_flaky_start_refuses_then_connects() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut client = SimClient::new(tx).with_flaky_start(2);

        client.connect("opc.tcp://localhost:26543").await.unwrap();
        client.connect("opc.tcp://localhost:26543").await.unwrap();
        client.connect("opc.tcp://localhost:26543").await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::ConnectFailed { .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::ConnectFailed { .. })
        ));
        assert!(matches!(rx.recv().await, Some(ClientEvent::Connected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitored_item_emits_samples_at_interval() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut client = SimClient::new(tx);

        client.connect("opc.tcp://localhost:26543").await.unwrap();
        client.create_session(&Credentials::Anonymous).await.unwrap();
        client
            .create_subscription(&SubscriptionParams::default())
            .await
            .unwrap();
        client
            .monitor_item("ns=1;s=PumpSpeed", &MonitoringParams::default())
            .await
            .unwrap();

        // Drain the lifecycle acknowledgements.
        assert!(matches!(rx.recv().await, Some(ClientEvent::Connected)));
        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::SessionCreated { .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::SubscriptionStarted { subscription_id: 1 })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::ItemInitialized { .. })
        ));

        // Default sampling interval is 250ms.
        let event = rx.recv().await;
        match event {
            Some(ClientEvent::ItemChanged(change)) => {
                assert_eq!(change.node_id, "ns=1;s=PumpSpeed");
                assert!(change.value.is_number());
            }
            other => panic!("Expected ItemChanged, got {:?}", other),
        }

        client.reset().await;
    }
}
