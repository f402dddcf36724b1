//! Inbound work items for the control loops.
//!
//! [`Command`]s arrive from the backend for the
//! [`ActuatorManager`](crate::actuators::ActuatorManager);
//! [`RuleUpdate`]s reconfigure the
//! [`LocalRuleEngine`](crate::rules::LocalRuleEngine) at runtime.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// A pending actuator command, resolved to a local output channel.
/// Lives for one fetch cycle only.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub channel: String,
    pub value: f64,
    pub issued_at: DateTime<Utc>,
}

/// New ON/OFF durations for a rule.  Applied at the rule's next phase
/// boundary, never mid-phase.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleUpdate {
    pub rule: String,
    pub on_duration: Duration,
    pub off_duration: Duration,
}
