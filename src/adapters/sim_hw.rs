//! Simulated hardware.
//!
//! Produces bounded, time-varying values per input channel from a seeded
//! generator, so two runs with the same seed read the same sequence.
//! Output channels read back the last value written to them.
//!
//! Faults can be injected per channel (and at connect) to exercise the
//! isolation paths of the control loops.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::app::ports::{HardwareInterface, HealthReport, HealthTracker};
use crate::channel::{self, Channel, Direction};
use crate::config::HardwareMode;
use crate::error::HardwareError;

struct SimChannel {
    rng: StdRng,
    reads: u64,
    /// Pre-loaded values replayed cyclically instead of the profile.
    trajectory: Vec<f64>,
    last_written: f64,
}

pub struct SimulatedHardware {
    channels: Vec<Channel>,
    state: HashMap<String, SimChannel>,
    health: HealthTracker,
    connected: bool,
    fail_connect: bool,
    failing: HashSet<String>,
}

impl SimulatedHardware {
    pub fn new(channels: Vec<Channel>, seed: u64) -> Self {
        let state = channels
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let sim = SimChannel {
                    rng: StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                    reads: 0,
                    trajectory: Vec::new(),
                    last_written: c.min.unwrap_or(0.0),
                };
                (c.id.clone(), sim)
            })
            .collect();
        let health = HealthTracker::new(&channels);
        Self {
            channels,
            state,
            health,
            connected: false,
            fail_connect: false,
            failing: HashSet::new(),
        }
    }

    /// Make every `connect` fail (startup-failure simulation).
    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make every read/write of `channel` fail until [`restore_channel`](Self::restore_channel).
    pub fn with_failing_channel(mut self, channel: &str) -> Self {
        self.fail_channel(channel);
        self
    }

    pub fn fail_channel(&mut self, channel: &str) {
        self.failing.insert(channel.to_string());
    }

    pub fn restore_channel(&mut self, channel: &str) {
        self.failing.remove(channel);
    }

    /// Replace the generated profile of `channel` with a cyclic trajectory.
    pub fn preload(&mut self, channel: &str, values: Vec<f64>) -> Result<(), HardwareError> {
        let sim = self
            .state
            .get_mut(channel)
            .ok_or_else(|| HardwareError::UnknownChannel(channel.to_string()))?;
        sim.trajectory = values;
        sim.reads = 0;
        Ok(())
    }

    pub fn last_written(&self, channel: &str) -> Option<f64> {
        self.state.get(channel).map(|s| s.last_written)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn sample(channel: &Channel, sim: &mut SimChannel) -> f64 {
        let n = sim.reads;
        sim.reads += 1;

        if !sim.trajectory.is_empty() {
            let idx = (n % sim.trajectory.len() as u64) as usize;
            return channel.clamp(sim.trajectory[idx]);
        }

        let profile = &channel.sim;
        if let Some(v) = profile.fixed {
            return channel.clamp(v);
        }

        let period = f64::from(profile.period_reads.max(1));
        let wave = profile.amplitude * (TAU * n as f64 / period).sin();
        let noise = if profile.noise > 0.0 {
            profile.noise * sim.rng.gen_range(-1.0..1.0)
        } else {
            0.0
        };
        channel.clamp(profile.base + wave + noise)
    }

    fn read_inner(&mut self, id: &str) -> Result<f64, HardwareError> {
        let ch = self
            .channels
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| HardwareError::UnknownChannel(id.to_string()))?;
        if self.failing.contains(id) {
            return Err(HardwareError::ReadFailed {
                channel: id.to_string(),
                reason: "injected fault".to_string(),
            });
        }
        let sim = self
            .state
            .get_mut(id)
            .ok_or_else(|| HardwareError::UnknownChannel(id.to_string()))?;
        match ch.direction {
            Direction::Output => Ok(sim.last_written),
            Direction::Input => Ok(Self::sample(ch, sim)),
        }
    }

    fn write_inner(&mut self, id: &str, value: f64) -> Result<(), HardwareError> {
        let ch = channel::lookup(&self.channels, id, Direction::Output)?;
        ch.check_output(value)?;
        if self.failing.contains(id) {
            return Err(HardwareError::WriteFailed {
                channel: id.to_string(),
                reason: "injected fault".to_string(),
            });
        }
        if let Some(sim) = self.state.get_mut(id) {
            sim.last_written = value;
        }
        debug!("sim: {} <- {}", id, value);
        Ok(())
    }
}

impl HardwareInterface for SimulatedHardware {
    fn connect(&mut self) -> Result<(), HardwareError> {
        if self.fail_connect {
            return Err(HardwareError::ConnectFailed(
                "simulated device did not respond".to_string(),
            ));
        }
        self.connected = true;
        info!("sim: connected ({} channels)", self.channels.len());
        Ok(())
    }

    fn read(&mut self, channel: &str) -> Result<f64, HardwareError> {
        if !self.connected {
            return Err(HardwareError::NotConnected);
        }
        let result = self.read_inner(channel);
        self.health.observe(channel, result)
    }

    fn write(&mut self, channel: &str, value: f64) -> Result<(), HardwareError> {
        if !self.connected {
            return Err(HardwareError::NotConnected);
        }
        let result = self.write_inner(channel, value);
        self.health.observe(channel, result)
    }

    fn disconnect(&mut self) {
        if self.connected {
            info!("sim: disconnected");
        }
        self.connected = false;
    }

    fn health(&self) -> HealthReport {
        self.health.report(HardwareMode::Simulated, self.connected)
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }
}
