//! LocalRuleEngine on virtual time: phase timeline, write retry,
//! reconfiguration at the boundary, safe state on shutdown.

use std::sync::Arc;
use std::time::Duration;

use edge_agent::adapters::SharedHardware;
use edge_agent::app::commands::RuleUpdate;
use edge_agent::app::events::AgentEvent;
use edge_agent::channel::Channel;
use edge_agent::config::RuleConfig;
use edge_agent::rules::{CyclePhase, LocalRuleEngine};
use tokio_util::sync::CancellationToken;

use crate::mock_hw::{MockHardware, Bench, RecordingSink, Write};

const TICK: Duration = Duration::from_millis(100);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

async fn engine(rules: &[RuleConfig]) -> (LocalRuleEngine, Bench, Arc<RecordingSink>) {
    let channels = vec![
        Channel::output("valve_1", "").with_bounds(0.0, 1.0),
        Channel::output("valve_2", "").with_bounds(0.0, 1.0),
    ];
    let (hw, bench) = MockHardware::boxed(channels);
    let hw = SharedHardware::new(hw);
    hw.connect().await.unwrap();
    let sink = RecordingSink::new();
    let engine = LocalRuleEngine::new(rules, hw, sink.clone(), TICK).unwrap();
    (engine, bench, sink)
}

fn valve_rule() -> RuleConfig {
    RuleConfig::new("irrigate", "valve_1", 5.0, 10.0)
}

/// Run the engine for `span` of virtual time, then cancel it.
async fn run_for(engine: LocalRuleEngine, span: Duration) {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(engine.run(cancel.clone()));
    tokio::time::sleep(span).await;
    cancel.cancel();
    task.await.unwrap().unwrap();
}

fn w(at_ms: u64, value: f64) -> Write {
    Write {
        at: ms(at_ms),
        channel: "valve_1".into(),
        value,
    }
}

#[tokio::test(start_paused = true)]
async fn five_on_ten_off_timeline() {
    let (engine, bench, sink) = engine(&[valve_rule()]).await;
    run_for(engine, Duration::from_millis(29_950)).await;

    let writes = bench.writes_to("valve_1");
    // OFF at start, ON 10-15, OFF 15-25, ON from 25, OFF on shutdown.
    assert_eq!(
        writes,
        vec![w(0, 0.0), w(10_000, 1.0), w(15_000, 0.0), w(25_000, 1.0), w(29_950, 0.0)]
    );

    // Exactly one complete ON interval of 5 s before the second ON begins.
    let before_second_on: Vec<_> = writes.iter().filter(|x| x.at < ms(25_000)).collect();
    let ons = before_second_on.iter().filter(|x| x.value == 1.0).count();
    assert_eq!(ons, 1);
    assert_eq!(writes[2].at - writes[1].at, ms(5_000));

    let transitions: Vec<CyclePhase> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::RuleTransition { phase, .. } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![CyclePhase::On, CyclePhase::Off, CyclePhase::On]
    );
}

#[tokio::test(start_paused = true)]
async fn cumulative_on_time_converges() {
    let (engine, bench, _) = engine(&[valve_rule()]).await;
    // 40 full cycles.
    run_for(engine, Duration::from_millis(600_050)).await;

    let writes = bench.writes_to("valve_1");
    let mut on_time = Duration::ZERO;
    for pair in writes.windows(2) {
        if pair[0].value == 1.0 {
            on_time += pair[1].at - pair[0].at;
        }
    }
    let ratio = on_time.as_secs_f64() / 600.05;
    assert!((ratio - 1.0 / 3.0).abs() < 1e-3, "ratio {ratio}");
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_retried_next_tick() {
    let (engine, bench, sink) = engine(&[valve_rule()]).await;
    bench.fail("valve_1");

    let cancel = CancellationToken::new();
    let task = tokio::spawn(engine.run(cancel.clone()));
    tokio::time::sleep(ms(1_050)).await;
    assert!(bench.writes_to("valve_1").is_empty());
    assert!(sink.count(|e| matches!(e, AgentEvent::RuleWriteFailed { .. })) >= 10);

    bench.restore("valve_1");
    tokio::time::sleep(ms(100)).await;
    assert_eq!(bench.writes_to("valve_1"), vec![w(1_100, 0.0)]);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn update_applies_at_next_boundary() {
    let (engine, bench, _) = engine(&[valve_rule()]).await;
    let updates = engine.updates();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(engine.run(cancel.clone()));
    tokio::time::sleep(ms(3_000)).await;
    updates
        .send(RuleUpdate {
            rule: "irrigate".into(),
            on_duration: ms(2_000),
            off_duration: ms(4_000),
        })
        .await
        .unwrap();
    tokio::time::sleep(ms(16_950)).await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    // The 10 s OFF in progress completes; new durations from t=10.
    assert_eq!(
        bench.writes_to("valve_1"),
        vec![
            w(0, 0.0),
            w(10_000, 1.0),
            w(12_000, 0.0),
            w(16_000, 1.0),
            w(18_000, 0.0),
            w(19_950, 0.0),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rules_are_independent() {
    let rules = [
        valve_rule(),
        RuleConfig::new("mist", "valve_2", 1.0, 1.0),
    ];
    let (engine, bench, _) = engine(&rules).await;
    run_for(engine, Duration::from_millis(4_050)).await;

    let on_times: Vec<Duration> = bench
        .writes_to("valve_2")
        .into_iter()
        .filter(|x| x.value == 1.0)
        .map(|x| x.at)
        .collect();
    assert_eq!(on_times, vec![ms(1_000), ms(3_000)]);
    assert_eq!(bench.writes_to("valve_1").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_on_switches_off() {
    let (engine, bench, _) = engine(&[valve_rule()]).await;
    run_for(engine, ms(12_000)).await;
    assert_eq!(bench.last_value("valve_1"), Some(0.0));
}
