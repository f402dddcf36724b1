//! Demo mode: simulated hardware pre-seeded with plausible trajectories.
//!
//! [`DemoSeeder`] wraps a [`SimulatedHardware`] and, on the first
//! `connect`, loads a cyclic curve into every input channel chosen by its
//! unit: a warm-up ramp for temperatures, a slow swing for humidity, a
//! gentle drift for pH, and a ramp to mid-range for anything else.

use std::f64::consts::TAU;

use log::info;

use super::sim_hw::SimulatedHardware;
use crate::app::ports::{HardwareInterface, HealthReport};
use crate::channel::Channel;
use crate::config::HardwareMode;
use crate::error::HardwareError;

/// Number of reads in one demo curve segment.
const SEGMENT: usize = 60;

pub struct DemoSeeder {
    inner: SimulatedHardware,
    seeded: bool,
}

impl DemoSeeder {
    pub fn new(inner: SimulatedHardware) -> Self {
        Self {
            inner,
            seeded: false,
        }
    }

    /// Build the demo curve for one channel.
    pub fn trajectory_for(channel: &Channel) -> Vec<f64> {
        let unit = channel.unit.trim().to_ascii_lowercase();
        let curve = match unit.as_str() {
            "c" | "°c" | "degc" | "celsius" => ramp_hold_cool(18.0, 26.0),
            "%" | "%rh" | "rh" => swing(50.0, 8.0, SEGMENT * 2),
            "ph" => swing(6.8, 0.25, SEGMENT * 4),
            _ => {
                let lo = channel.min.unwrap_or(0.0);
                let hi = channel.max.unwrap_or(lo + 100.0);
                ramp_hold_cool(lo, lo + (hi - lo) / 2.0)
            }
        };
        curve.into_iter().map(|v| channel.clamp(v)).collect()
    }

    fn seed(&mut self) -> Result<(), HardwareError> {
        let inputs: Vec<Channel> = self
            .inner
            .channels()
            .iter()
            .filter(|c| c.is_input())
            .cloned()
            .collect();
        for ch in &inputs {
            self.inner.preload(&ch.id, Self::trajectory_for(ch))?;
        }
        info!("demo: seeded {} input trajectories", inputs.len());
        self.seeded = true;
        Ok(())
    }
}

/// Linear warm-up from `from` to `to`, a plateau with a small ripple, then a
/// cool-down back to `from`.
fn ramp_hold_cool(from: f64, to: f64) -> Vec<f64> {
    let step = (to - from) / SEGMENT as f64;
    let ripple = (to - from).abs() * 0.03;
    let up = (0..SEGMENT).map(|i| from + step * i as f64);
    let hold = (0..SEGMENT).map(|i| to + ripple * (TAU * i as f64 / SEGMENT as f64).sin());
    let down = (0..SEGMENT).map(|i| to - step * i as f64);
    up.chain(hold).chain(down).collect()
}

fn swing(center: f64, amplitude: f64, period: usize) -> Vec<f64> {
    (0..period)
        .map(|i| center + amplitude * (TAU * i as f64 / period as f64).sin())
        .collect()
}

impl HardwareInterface for DemoSeeder {
    fn connect(&mut self) -> Result<(), HardwareError> {
        self.inner.connect()?;
        if !self.seeded {
            self.seed()?;
        }
        Ok(())
    }

    fn read(&mut self, channel: &str) -> Result<f64, HardwareError> {
        self.inner.read(channel)
    }

    fn write(&mut self, channel: &str, value: f64) -> Result<(), HardwareError> {
        self.inner.write(channel, value)
    }

    fn disconnect(&mut self) {
        self.inner.disconnect();
    }

    fn health(&self) -> HealthReport {
        HealthReport {
            mode: HardwareMode::Demo,
            ..self.inner.health()
        }
    }

    fn channels(&self) -> &[Channel] {
        self.inner.channels()
    }
}
