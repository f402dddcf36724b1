//! Port traits: the hexagonal boundary between the control loops and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SensorManager / ActuatorManager / LocalRuleEngine
//! ```
//!
//! Hardware variants (real, simulated, demo) implement [`HardwareInterface`];
//! event consumers (log output, diagnostics counters) implement
//! [`EventSink`].  The loops only ever see these traits.

use std::collections::BTreeMap;

use crate::channel::Channel;
use crate::config::HardwareMode;
use crate::error::HardwareError;

// ───────────────────────────────────────────────────────────────
// Hardware port
// ───────────────────────────────────────────────────────────────

/// Capability contract shared by every hardware variant.
///
/// The variant is chosen once at startup and never swapped.  Methods are
/// synchronous and take `&mut self`; concurrent callers go through
/// [`SharedHardware`](crate::adapters::SharedHardware), which serializes
/// access to the transport.
pub trait HardwareInterface: Send {
    /// Establish the device link.  Failure here is fatal at startup.
    fn connect(&mut self) -> Result<(), HardwareError>;

    /// Read the calibrated value of an input (or output read-back) channel.
    /// Fails with [`HardwareError::NotConnected`] when disconnected; never
    /// reconnects implicitly.
    fn read(&mut self, channel: &str) -> Result<f64, HardwareError>;

    /// Drive an output channel to `value` (engineering units).
    fn write(&mut self, channel: &str, value: f64) -> Result<(), HardwareError>;

    /// Release the device link.  Idempotent.
    fn disconnect(&mut self);

    fn health(&self) -> HealthReport;

    /// Channel table loaded at startup.
    fn channels(&self) -> &[Channel];
}

// ───────────────────────────────────────────────────────────────
// Health reporting
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelHealth {
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub mode: HardwareMode,
    pub connected: bool,
    pub channels: BTreeMap<String, ChannelHealth>,
}

impl HealthReport {
    /// Channels whose most recent operation failed.
    pub fn degraded(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|(_, h)| h.consecutive_failures > 0)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.connected && self.degraded().is_empty()
    }
}

/// Per-channel failure bookkeeping shared by the hardware variants.
#[derive(Debug, Clone, Default)]
pub struct HealthTracker {
    channels: BTreeMap<String, ChannelHealth>,
}

impl HealthTracker {
    pub fn new(channels: &[Channel]) -> Self {
        Self {
            channels: channels
                .iter()
                .map(|c| (c.id.clone(), ChannelHealth::default()))
                .collect(),
        }
    }

    /// Record the outcome of one operation and pass it through unchanged.
    pub fn observe<T>(
        &mut self,
        channel: &str,
        result: Result<T, HardwareError>,
    ) -> Result<T, HardwareError> {
        // Unknown-channel lookups are caller errors, not channel health.
        if let Some(h) = self.channels.get_mut(channel) {
            match &result {
                Ok(_) => h.consecutive_failures = 0,
                Err(e) => {
                    h.consecutive_failures = h.consecutive_failures.saturating_add(1);
                    h.total_failures += 1;
                    h.last_error = Some(e.to_string());
                }
            }
        }
        result
    }

    pub fn report(&self, mode: HardwareMode, connected: bool) -> HealthReport {
        HealthReport {
            mode,
            connected,
            channels: self.channels.clone(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port
// ───────────────────────────────────────────────────────────────

/// The loops emit structured [`AgentEvent`](super::events::AgentEvent)s
/// through this port.  Adapters decide where they go (log output,
/// diagnostics counters, test recorders).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &super::events::AgentEvent);
}
