//! Channel model: named hardware I/O points loaded once from configuration.
//!
//! A [`Channel`] carries everything any hardware variant needs to address
//! it: direction, unit, calibration, bounds, the sysfs path used by
//! [`RealHardware`](crate::adapters::real_hw::RealHardware), and the
//! simulation profile used by
//! [`SimulatedHardware`](crate::adapters::sim_hw::SimulatedHardware).

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardwareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Linear raw ↔ engineering-unit conversion: `value = raw * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub scale: f64,
    pub offset: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl Calibration {
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    /// Inverse of [`apply`](Self::apply). `scale` is validated non-zero at load.
    pub fn invert(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

/// Simulation profile for one channel.
///
/// `fixed` wins when present.  Otherwise the value follows
/// `base + amplitude * sin(2π·n / period_reads) + noise·u` where `n` is the
/// read index and `u` is uniform in `[-1, 1)` from the seeded generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimProfile {
    pub fixed: Option<f64>,
    pub base: f64,
    pub amplitude: f64,
    pub period_reads: u32,
    pub noise: f64,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            fixed: None,
            base: 20.0,
            amplitude: 2.0,
            period_reads: 120,
            noise: 0.1,
        }
    }
}

impl SimProfile {
    pub fn fixed(value: f64) -> Self {
        Self {
            fixed: Some(value),
            ..Self::default()
        }
    }
}

/// A configured hardware channel. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub direction: Direction,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Backend event this channel reports to / receives commands from.
    /// Defaults to `id`.
    #[serde(default)]
    pub event_public_id: Option<String>,
    /// sysfs path relative to `hardware.sysfs_root` (real mode only).
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sim: SimProfile,
}

impl Channel {
    pub fn input(id: &str, unit: &str) -> Self {
        Self::new(id, Direction::Input, unit)
    }

    pub fn output(id: &str, unit: &str) -> Self {
        Self::new(id, Direction::Output, unit)
    }

    fn new(id: &str, direction: Direction, unit: &str) -> Self {
        Self {
            id: id.to_string(),
            direction,
            unit: unit.to_string(),
            calibration: Calibration::default(),
            min: None,
            max: None,
            event_public_id: None,
            path: None,
            sim: SimProfile::default(),
        }
    }

    pub fn with_sim(mut self, sim: SimProfile) -> Self {
        self.sim = sim;
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_event(mut self, public_id: &str) -> Self {
        self.event_public_id = Some(public_id.to_string());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    /// Backend identifier for this channel.
    pub fn event_id(&self) -> &str {
        self.event_public_id.as_deref().unwrap_or(&self.id)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let v = self.min.map_or(value, |lo| value.max(lo));
        self.max.map_or(v, |hi| v.min(hi))
    }

    /// Reject writes outside the configured bounds; never clamp a command.
    pub fn check_output(&self, value: f64) -> Result<(), HardwareError> {
        let below = self.min.is_some_and(|lo| value < lo);
        let above = self.max.is_some_and(|hi| value > hi);
        if below || above || !value.is_finite() {
            return Err(HardwareError::OutOfRange {
                channel: self.id.clone(),
                value,
            });
        }
        Ok(())
    }
}

/// Resolve `id` within `channels`, enforcing the expected direction.
pub fn lookup<'a>(
    channels: &'a [Channel],
    id: &str,
    expected: Direction,
) -> Result<&'a Channel, HardwareError> {
    let ch = channels
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| HardwareError::UnknownChannel(id.to_string()))?;
    if ch.direction != expected {
        return Err(HardwareError::WrongDirection {
            channel: id.to_string(),
            expected,
        });
    }
    Ok(ch)
}
