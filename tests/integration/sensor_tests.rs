//! SensorManager: tick cadence, per-channel isolation, dropped batches.

use std::sync::Arc;
use std::time::Duration;

use edge_agent::adapters::SharedHardware;
use edge_agent::adapters::sim_hw::SimulatedHardware;
use edge_agent::app::events::AgentEvent;
use edge_agent::app::ports::EventSink;
use edge_agent::channel::{Channel, SimProfile};
use edge_agent::client::retry::RetryPolicy;
use edge_agent::client::transport::Transport;
use edge_agent::client::{Credentials, ResilientClient};
use edge_agent::config::SensorConfig;
use edge_agent::error::TransportError;
use edge_agent::sensors::{DatapointBatch, SensorManager};
use tokio_util::sync::CancellationToken;

use crate::mock_backend::{LOGIN, ScriptedBackend, Step};
use crate::mock_hw::RecordingSink;

const BATCH: &str = "/datapoints/batch";

fn fixed_inputs() -> Vec<Channel> {
    vec![
        Channel::input("a", "C").with_sim(SimProfile::fixed(10.0)),
        Channel::input("b", "C").with_sim(SimProfile::fixed(20.0)),
        Channel::input("c", "C")
            .with_sim(SimProfile::fixed(30.0))
            .with_event("tank-c"),
        Channel::output("valve", "").with_bounds(0.0, 1.0),
    ]
}

async fn hardware(sim: SimulatedHardware) -> SharedHardware {
    let hw = SharedHardware::new(Box::new(sim));
    hw.connect().await.unwrap();
    hw
}

fn manager(
    hw: SharedHardware,
    backend: &Arc<ScriptedBackend>,
    sink: Arc<dyn EventSink>,
) -> SensorManager {
    let transport: Arc<dyn Transport> = backend.clone();
    let policy = RetryPolicy {
        jitter: false,
        ..RetryPolicy::default()
    };
    let creds = Credentials {
        username: "agent".into(),
        password: "secret".into(),
    };
    let client = Arc::new(ResilientClient::new(transport, creds, LOGIN, policy));
    let config = SensorConfig {
        poll_interval_ms: 1_000,
        batch_path: BATCH.into(),
    };
    SensorManager::new(&config, hw, client, sink)
}

fn batches(backend: &ScriptedBackend) -> Vec<DatapointBatch> {
    backend
        .requests_to(BATCH)
        .into_iter()
        .filter_map(|r| r.body)
        .map(|b| serde_json::from_value(b).unwrap())
        .collect()
}

fn sorted_values(batch: &DatapointBatch) -> Vec<f64> {
    let mut v: Vec<f64> = batch.datapoints.iter().map(|d| d.value).collect();
    v.sort_by(f64::total_cmp);
    v
}

#[tokio::test(start_paused = true)]
async fn five_seconds_yield_five_full_batches() {
    let backend = ScriptedBackend::new();
    let sink = RecordingSink::new();
    let hw = hardware(SimulatedHardware::new(fixed_inputs(), 7)).await;
    let sensors = manager(hw, &backend, sink.clone());

    let cancel = CancellationToken::new();
    let task = tokio::spawn(sensors.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    let sent = batches(&backend);
    assert!(sent.len() >= 5, "only {} batches", sent.len());
    for batch in &sent {
        assert_eq!(batch.len(), 3);
        assert_eq!(sorted_values(batch), vec![10.0, 20.0, 30.0]);
    }
    let ids: Vec<&str> = sent[0]
        .datapoints
        .iter()
        .map(|d| d.event_public_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "b", "tank-c"]);
    assert_eq!(
        sink.count(|e| matches!(e, AgentEvent::BatchSent { datapoints: 3 })),
        sent.len()
    );
}

#[tokio::test(start_paused = true)]
async fn failing_channel_does_not_block_others() {
    let backend = ScriptedBackend::new();
    let sink = RecordingSink::new();
    let sim = SimulatedHardware::new(fixed_inputs(), 7).with_failing_channel("b");
    let sensors = manager(hardware(sim).await, &backend, sink.clone());

    let report = sensors.tick().await;
    assert_eq!(report.read, 2);
    assert_eq!(report.failed, vec!["b".to_string()]);
    assert!(report.delivered);

    let sent = batches(&backend);
    assert_eq!(sent.len(), 1);
    assert_eq!(sorted_values(&sent[0]), vec![10.0, 30.0]);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AgentEvent::ChannelReadFailed { channel, .. } if channel == "b"
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn undeliverable_batch_is_dropped_not_queued() {
    let backend = ScriptedBackend::new();
    backend.script(BATCH, vec![Step::Fail(TransportError::Connect("refused".into())); 4]);
    let sink = RecordingSink::new();
    let hw = hardware(SimulatedHardware::new(fixed_inputs(), 7)).await;
    let sensors = manager(hw, &backend, sink.clone());

    let first = sensors.tick().await;
    assert!(!first.delivered);
    assert_eq!(
        sink.count(|e| matches!(e, AgentEvent::BatchDropped { datapoints: 3, .. })),
        1
    );

    let second = sensors.tick().await;
    assert!(second.delivered);
    let requests = backend.requests_to(BATCH);
    assert_eq!(requests.len(), 5);
    let last: DatapointBatch =
        serde_json::from_value(requests[4].body.clone().unwrap()).unwrap();
    assert_eq!(last.len(), 3, "dropped readings must not be carried over");
}

#[tokio::test(start_paused = true)]
async fn all_channels_failing_sends_nothing() {
    let backend = ScriptedBackend::new();
    let sink = RecordingSink::new();
    let sim = SimulatedHardware::new(fixed_inputs(), 7)
        .with_failing_channel("a")
        .with_failing_channel("b")
        .with_failing_channel("c");
    let sensors = manager(hardware(sim).await, &backend, sink.clone());

    let report = sensors.tick().await;
    assert_eq!(report.read, 0);
    assert_eq!(report.failed.len(), 3);
    assert!(backend.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnected_hardware_is_a_read_failure_per_channel() {
    let backend = ScriptedBackend::new();
    let sink = RecordingSink::new();
    let hw = SharedHardware::new(Box::new(SimulatedHardware::new(fixed_inputs(), 7)));
    let sensors = manager(hw, &backend, sink.clone());

    let report = sensors.tick().await;
    assert_eq!(report.failed.len(), 3);
    assert!(sink.events().iter().any(|e| matches!(
        e,
        AgentEvent::ChannelReadFailed { error, .. } if error.contains("not connected")
    )));
}
