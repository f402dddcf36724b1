//! ActuatorManager: command routing, per-channel isolation, de-duplication.

use std::sync::Arc;

use edge_agent::actuators::ActuatorManager;
use edge_agent::adapters::SharedHardware;
use edge_agent::app::events::AgentEvent;
use edge_agent::channel::{Channel, SimProfile};
use edge_agent::client::retry::RetryPolicy;
use edge_agent::client::transport::Transport;
use edge_agent::client::{Credentials, ResilientClient};
use edge_agent::config::ActuatorConfig;

use crate::mock_backend::{LOGIN, ScriptedBackend};
use crate::mock_hw::{MockHardware, Bench, RecordingSink};

const EVENTS: &str = "/events";

fn channels() -> Vec<Channel> {
    vec![
        Channel::output("valve_1", "")
            .with_bounds(0.0, 1.0)
            .with_event("evt-valve-1"),
        Channel::output("valve_2", "")
            .with_bounds(0.0, 1.0)
            .with_event("evt-valve-2"),
        Channel::output("drip", "%").with_bounds(0.0, 100.0),
        Channel::input("soil", "%").with_sim(SimProfile::fixed(40.0)),
    ]
}

struct Rig {
    actuators: ActuatorManager,
    backend: Arc<ScriptedBackend>,
    bench: Bench,
    sink: Arc<RecordingSink>,
}

async fn rig(rule_owned: &[&str]) -> Rig {
    let backend = ScriptedBackend::new();
    let (hw, bench) = MockHardware::boxed(channels());
    let hw = SharedHardware::new(hw);
    hw.connect().await.unwrap();
    let sink = RecordingSink::new();

    let transport: Arc<dyn Transport> = backend.clone();
    let creds = Credentials {
        username: "agent".into(),
        password: "secret".into(),
    };
    let policy = RetryPolicy {
        jitter: false,
        ..RetryPolicy::default()
    };
    let client = Arc::new(ResilientClient::new(transport, creds, LOGIN, policy));
    let actuators = ActuatorManager::new(
        &ActuatorConfig::default(),
        hw,
        client,
        sink.clone(),
        rule_owned.iter().map(|s| s.to_string()),
    );
    Rig {
        actuators,
        backend,
        bench,
        sink,
    }
}

fn command(public_id: &str, value: f64, issued_at: &str) -> String {
    format!(
        r#"{{"public_id":"{public_id}","pending_command":{{"value":{value},"issued_at":"{}"}}}}"#,
        issued_at
    )
}

#[tokio::test(start_paused = true)]
async fn pending_commands_are_written_to_matching_outputs() {
    let mut r = rig(&[]).await;
    let body = format!(
        "[{},{},{}]",
        command("evt-valve-1", 1.0, "2026-03-01T10:00:00Z"),
        command("drip", 35.0, "2026-03-01T10:00:00Z"),
        r#"{"public_id":"soil","name":"Soil moisture"}"#
    );
    r.backend.respond_with(EVENTS, 200, &body);

    let report = r.actuators.poll().await;
    assert_eq!(report.applied, vec!["valve_1".to_string(), "drip".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(r.bench.last_value("valve_1"), Some(1.0));
    assert_eq!(r.bench.last_value("drip"), Some(35.0));
    assert_eq!(r.bench.last_value("valve_2"), None);
    assert_eq!(
        r.sink.count(|e| matches!(e, AgentEvent::CommandApplied { .. })),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn wrapped_event_list_is_accepted() {
    let mut r = rig(&[]).await;
    let body = format!(
        r#"{{"events":[{}]}}"#,
        command("evt-valve-2", 1.0, "2026-03-01T10:00:00Z")
    );
    r.backend.respond_with(EVENTS, 200, &body);

    let report = r.actuators.poll().await;
    assert_eq!(report.applied, vec!["valve_2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn one_failing_write_does_not_block_the_rest() {
    let mut r = rig(&[]).await;
    r.bench.fail("valve_1");
    let body = format!(
        "[{},{}]",
        command("evt-valve-1", 1.0, "2026-03-01T10:00:00Z"),
        command("evt-valve-2", 1.0, "2026-03-01T10:00:00Z"),
    );
    r.backend.respond_with(EVENTS, 200, &body);

    let report = r.actuators.poll().await;
    assert_eq!(report.failed, vec!["valve_1".to_string()]);
    assert_eq!(report.applied, vec!["valve_2".to_string()]);
    assert_eq!(r.bench.last_value("valve_2"), Some(1.0));

    // Retried on the next poll once the channel recovers.
    r.bench.restore("valve_1");
    let report = r.actuators.poll().await;
    assert_eq!(report.applied, vec!["valve_1".to_string()]);
    assert_eq!(report.skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_command_is_rejected_per_channel() {
    let mut r = rig(&[]).await;
    let body = format!(
        "[{},{}]",
        command("evt-valve-1", 5.0, "2026-03-01T10:00:00Z"),
        command("drip", 10.0, "2026-03-01T10:00:00Z"),
    );
    r.backend.respond_with(EVENTS, 200, &body);

    let report = r.actuators.poll().await;
    assert_eq!(report.failed, vec!["valve_1".to_string()]);
    assert_eq!(report.applied, vec!["drip".to_string()]);
    assert!(r.sink.events().iter().any(|e| matches!(
        e,
        AgentEvent::CommandFailed { channel, error }
            if channel == "valve_1" && error.contains("out of range")
    )));
}

#[tokio::test(start_paused = true)]
async fn repeated_command_is_applied_once() {
    let mut r = rig(&[]).await;
    r.backend.respond_with(
        EVENTS,
        200,
        &format!("[{}]", command("evt-valve-1", 1.0, "2026-03-01T10:00:00Z")),
    );
    r.actuators.poll().await;
    let second = r.actuators.poll().await;
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, 1);
    assert_eq!(r.bench.writes_to("valve_1").len(), 1);

    // A newer command for the same channel goes through.
    r.backend.respond_with(
        EVENTS,
        200,
        &format!("[{}]", command("evt-valve-1", 0.0, "2026-03-01T10:05:00Z")),
    );
    let third = r.actuators.poll().await;
    assert_eq!(third.applied, vec!["valve_1".to_string()]);
    assert_eq!(r.bench.last_value("valve_1"), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn rule_owned_channel_ignores_backend_commands() {
    let mut r = rig(&["valve_1"]).await;
    r.backend.respond_with(
        EVENTS,
        200,
        &format!("[{}]", command("evt-valve-1", 1.0, "2026-03-01T10:00:00Z")),
    );
    let report = r.actuators.poll().await;
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped, 1);
    assert!(r.bench.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn commands_for_inputs_or_unknown_events_are_skipped() {
    let mut r = rig(&[]).await;
    let body = format!(
        "[{},{}]",
        command("soil", 1.0, "2026-03-01T10:00:00Z"),
        command("not-ours", 1.0, "2026-03-01T10:00:00Z"),
    );
    r.backend.respond_with(EVENTS, 200, &body);

    let report = r.actuators.poll().await;
    assert_eq!(report.skipped, 2);
    assert!(r.bench.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_is_reported_and_nothing_written() {
    let mut r = rig(&[]).await;
    r.backend.respond_with(EVENTS, 500, "down");

    let report = r.actuators.poll().await;
    assert_eq!(report, Default::default());
    assert_eq!(
        r.sink.count(|e| matches!(e, AgentEvent::CommandFetchFailed { .. })),
        1
    );
    assert_eq!(r.backend.requests_to(EVENTS).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn malformed_event_does_not_discard_valid_commands() {
    let mut r = rig(&[]).await;
    let body = format!(
        r#"[{},{{"public_id":"evt-valve-2","pending_command":{{"value":1.0}}}},{}]"#,
        command("evt-valve-1", 1.0, "2026-03-01T10:00:00Z"),
        r#"{"public_id":"drip",
            "pending_command":{"value":"half","issued_at":"2026-03-01T10:00:00Z"}}"#
    );
    r.backend.respond_with(EVENTS, 200, &body);

    let report = r.actuators.poll().await;
    assert_eq!(report.applied, vec!["valve_1".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, 2);
    assert_eq!(r.bench.last_value("valve_1"), Some(1.0));
    assert_eq!(r.bench.last_value("valve_2"), None);
    assert_eq!(
        r.sink.count(|e| matches!(e, AgentEvent::CommandFetchFailed { .. })),
        0
    );
}
