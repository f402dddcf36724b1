//! Runtime diagnostics.
//!
//! [`Diagnostics`] is an [`EventSink`] decorator: it counts the events
//! that pass through it, then forwards them to the wrapped sink.  The
//! health reporter combines a [`Diagnostics::snapshot`] with the hardware
//! [`HealthReport`] into one [`HealthSummary`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::app::events::{AgentEvent, HealthSummary};
use crate::app::ports::{EventSink, HealthReport};

#[derive(Debug, Default)]
struct Counters {
    sensor_ticks: AtomicU64,
    batches_sent: AtomicU64,
    batches_dropped: AtomicU64,
    read_failures: AtomicU64,
    commands_applied: AtomicU64,
    command_failures: AtomicU64,
    rule_transitions: AtomicU64,
}

pub struct Diagnostics {
    counters: Counters,
    inner: Arc<dyn EventSink>,
}

impl Diagnostics {
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        Self {
            counters: Counters::default(),
            inner,
        }
    }

    pub fn snapshot(&self, hardware: &HealthReport) -> HealthSummary {
        let c = &self.counters;
        let get = |a: &AtomicU64| a.load(Ordering::Relaxed);
        HealthSummary {
            connected: hardware.connected,
            degraded_channels: hardware.degraded().into_iter().map(String::from).collect(),
            sensor_ticks: get(&c.sensor_ticks),
            batches_sent: get(&c.batches_sent),
            batches_dropped: get(&c.batches_dropped),
            read_failures: get(&c.read_failures),
            commands_applied: get(&c.commands_applied),
            command_failures: get(&c.command_failures),
            rule_transitions: get(&c.rule_transitions),
        }
    }
}

impl EventSink for Diagnostics {
    fn emit(&self, event: &AgentEvent) {
        let c = &self.counters;
        let counter = match event {
            AgentEvent::SensorTick => Some(&c.sensor_ticks),
            AgentEvent::BatchSent { .. } => Some(&c.batches_sent),
            AgentEvent::BatchDropped { .. } => Some(&c.batches_dropped),
            AgentEvent::ChannelReadFailed { .. } => Some(&c.read_failures),
            AgentEvent::CommandApplied { .. } => Some(&c.commands_applied),
            AgentEvent::CommandFailed { .. } => Some(&c.command_failures),
            AgentEvent::RuleTransition { .. } => Some(&c.rule_transitions),
            _ => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.emit(event);
    }
}
