//! Integration tests for zenoh-bridge-opcua.
//!
//! Exercises the full lifecycle machine against the simulated backend
//! through the public API only, with a recording bus standing in for Zenoh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use zenoh_bridge_opcua::bus::{BusClient, BusError};
use zenoh_bridge_opcua::config::{OpcuaBridgeConfig, OpcuaConfig};
use zenoh_bridge_opcua::publisher::TelemetryPublisher;
use zenoh_bridge_opcua::sim::SimClient;
use zenoh_bridge_opcua::subscriber::OpcuaSubscriber;

#[derive(Clone, Default)]
struct RecordingBus {
    messages: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl BusClient for RecordingBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

fn scenario_config() -> OpcuaConfig {
    let json = r#"{
        zenoh: { mode: "peer" },
        opcua: {
            server: { name: "server", url: "opc.tcp://localhost:26543" },
            subscriptions: [
                { name: "MyPumpSpeed", node_id: "ns=1;s=PumpSpeed" },
                { name: "MyTankLevel", node_id: "ns=1;s=TankLevel" }
            ],
            client: {
                connection_strategy: { max_retry: 5, initial_delay_ms: 2000, max_delay_ms: 10000 }
            }
        }
    }"#;

    let config: OpcuaBridgeConfig = json5::from_str(json).expect("Config should parse");
    config.validate().expect("Config should validate");
    config.opcua
}

#[tokio::test(start_paused = true)]
async fn sim_backend_publishes_monitored_changes() {
    let config = scenario_config();
    let (events_tx, events_rx) = mpsc::channel(1024);
    let client = SimClient::new(events_tx);
    let bus = RecordingBus::default();
    let publisher = TelemetryPublisher::new(bus.clone(), config.server.name.clone());
    let subscriber = OpcuaSubscriber::new(client, events_rx, publisher, config);

    let bridge = tokio::spawn(subscriber.run());

    // Default sampling interval is 250ms; three virtual seconds yield a
    // steady stream from both monitored nodes.
    tokio::time::sleep(Duration::from_secs(3)).await;
    bridge.abort();

    let messages = bus.messages.lock().unwrap();
    assert!(messages.len() >= 8, "Expected a stream of changes");

    let pump_topic = "/opcua/server/node/MyPumpSpeed";
    let tank_topic = "/opcua/server/node/MyTankLevel";
    assert!(messages.iter().any(|(topic, _)| topic == pump_topic));
    assert!(messages.iter().any(|(topic, _)| topic == tank_topic));

    for (topic, payload) in messages.iter() {
        assert!(topic == pump_topic || topic == tank_topic);

        let json: serde_json::Value = serde_json::from_slice(payload).expect("Payload is JSON");
        assert!(json["id"].as_str().unwrap().starts_with("ns=1;s="));
        assert!(json["value"].is_number());
        assert!(json["timestamp"].is_string());
    }
}

#[tokio::test(start_paused = true)]
async fn flaky_server_is_retried_until_monitoring() {
    let config = scenario_config();
    let (events_tx, events_rx) = mpsc::channel(1024);
    let client = SimClient::new(events_tx).with_flaky_start(2);
    let bus = RecordingBus::default();
    let publisher = TelemetryPublisher::new(bus.clone(), config.server.name.clone());
    let subscriber = OpcuaSubscriber::new(client, events_rx, publisher, config);

    let bridge = tokio::spawn(subscriber.run());

    // Two refusals cost 2s + 4s of backoff before the chain comes up.
    tokio::time::sleep(Duration::from_secs(10)).await;
    bridge.abort();

    let messages = bus.messages.lock().unwrap();
    assert!(
        !messages.is_empty(),
        "Bridge should reach Monitoring after the flaky start"
    );
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_leaves_bus_untouched() {
    let mut config = scenario_config();
    config.client.connection_strategy.max_retry = 1;
    config.client.connection_strategy.initial_delay_ms = 100;

    let (events_tx, events_rx) = mpsc::channel(1024);
    let client = SimClient::new(events_tx).with_flaky_start(10);
    let bus = RecordingBus::default();
    let publisher = TelemetryPublisher::new(bus.clone(), config.server.name.clone());
    let subscriber = OpcuaSubscriber::new(client, events_rx, publisher, config);

    let bridge = tokio::spawn(subscriber.run());

    // The run future completes on its own once the budget is exhausted.
    tokio::time::timeout(Duration::from_secs(60), bridge)
        .await
        .expect("Bridge should halt")
        .expect("Bridge task should not panic");

    assert!(bus.messages.lock().unwrap().is_empty());
}
