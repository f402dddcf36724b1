//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each [`AgentEvent`] as one line
//! through the `log` facade.  Routine per-tick events go to `debug`,
//! failures to `warn`.

use log::{debug, error, info, warn};

use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AgentEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AgentEvent) {
        match event {
            AgentEvent::Started { mode } => {
                info!("START | hardware={}", mode);
            }
            AgentEvent::SensorTick => {
                debug!("SENSE | tick");
            }
            AgentEvent::ChannelReadFailed { channel, error } => {
                warn!("SENSE | skipped {} ({})", channel, error);
            }
            AgentEvent::BatchSent { datapoints } => {
                debug!("BATCH | sent n={}", datapoints);
            }
            AgentEvent::BatchDropped { datapoints, error } => {
                warn!("BATCH | dropped n={} ({})", datapoints, error);
            }
            AgentEvent::CommandFetchFailed { error } => {
                warn!("CMD   | fetch failed ({})", error);
            }
            AgentEvent::CommandApplied { channel, value } => {
                info!("CMD   | {} <- {}", channel, value);
            }
            AgentEvent::CommandFailed { channel, error } => {
                warn!("CMD   | {} write failed ({})", channel, error);
            }
            AgentEvent::RuleTransition { rule, phase } => {
                info!("RULE  | {} -> {:?}", rule, phase);
            }
            AgentEvent::RuleWriteFailed { rule, error } => {
                warn!("RULE  | {} write failed ({})", rule, error);
            }
            AgentEvent::Health(h) => {
                info!(
                    "HEALTH | connected={} degraded=[{}] | ticks={} sent={} dropped={} \
                     read_fail={} | cmds={} cmd_fail={} | transitions={}",
                    h.connected,
                    h.degraded_channels.join(","),
                    h.sensor_ticks,
                    h.batches_sent,
                    h.batches_dropped,
                    h.read_failures,
                    h.commands_applied,
                    h.command_failures,
                    h.rule_transitions,
                );
            }
            AgentEvent::TaskFailed { task, error: e } => {
                error!("TASK  | {} failed: {}", task, e);
            }
            AgentEvent::Stopped => {
                info!("STOP  | all tasks stopped, hardware released");
            }
        }
    }
}
