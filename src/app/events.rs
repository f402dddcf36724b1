//! Outbound agent events.
//!
//! The control loops and the orchestrator emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log a line, bump a counter, record for a
//! test assertion.

use crate::config::HardwareMode;
use crate::rules::CyclePhase;

/// Structured events emitted by the agent core.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Hardware connected and the task group is about to start.
    Started { mode: HardwareMode },

    /// One sensor tick began.
    SensorTick,

    /// An input channel failed during a sensor tick and was skipped.
    ChannelReadFailed { channel: String, error: String },

    /// A batch was accepted by the backend.
    BatchSent { datapoints: usize },

    /// A batch could not be delivered and was discarded.
    BatchDropped { datapoints: usize, error: String },

    /// Pending commands could not be fetched this cycle.
    CommandFetchFailed { error: String },

    CommandApplied { channel: String, value: f64 },

    CommandFailed { channel: String, error: String },

    /// A local rule crossed a phase boundary.
    RuleTransition { rule: String, phase: CyclePhase },

    RuleWriteFailed { rule: String, error: String },

    /// Periodic health summary.
    Health(HealthSummary),

    /// A supervised task ended abnormally.
    TaskFailed { task: &'static str, error: String },

    /// All tasks have stopped and hardware is released.
    Stopped,
}

/// A point-in-time health summary suitable for logging.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HealthSummary {
    pub connected: bool,
    pub degraded_channels: Vec<String>,
    pub sensor_ticks: u64,
    pub batches_sent: u64,
    pub batches_dropped: u64,
    pub read_failures: u64,
    pub commands_applied: u64,
    pub command_failures: u64,
    pub rule_transitions: u64,
}
