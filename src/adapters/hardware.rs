//! Shared hardware handle and variant selection.
//!
//! The variant is built once from [`HardwareConfig`](crate::config::HardwareConfig)
//! and wrapped in a [`SharedHardware`], the only way the control loops reach
//! the device.  The mutex serializes every transport operation: sensor
//! reads, actuator writes and rule writes never interleave on the bus.
//!
//! Port calls are synchronous and may block on device files, so each one
//! runs on tokio's blocking pool under an operation timeout.  A stalled
//! attribute costs its caller one `op_timeout` and a [`HardwareError::Timeout`];
//! the async side stays responsive and cancellable.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::demo::DemoSeeder;
use super::real_hw::RealHardware;
use super::sim_hw::SimulatedHardware;
use crate::app::ports::{HardwareInterface, HealthReport};
use crate::channel::Channel;
use crate::config::{AgentConfig, HardwareMode};
use crate::error::HardwareError;

pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the hardware variant named by `config.hardware.mode`.
pub fn build_hardware(config: &AgentConfig) -> Box<dyn HardwareInterface> {
    let channels = config.channels.clone();
    let hw = &config.hardware;
    info!("hw: mode={} channels={}", hw.mode, channels.len());
    match hw.mode {
        HardwareMode::Real => Box::new(RealHardware::new(&hw.sysfs_root, channels)),
        HardwareMode::Simulated => Box::new(SimulatedHardware::new(channels, hw.seed)),
        HardwareMode::Demo => Box::new(DemoSeeder::new(SimulatedHardware::new(
            channels, hw.seed,
        ))),
    }
}

type Device = Box<dyn HardwareInterface>;

/// Cloneable, mutex-guarded handle to the single hardware instance.
#[derive(Clone)]
pub struct SharedHardware {
    inner: Arc<Mutex<Device>>,
    channels: Arc<[Channel]>,
    op_timeout: Duration,
}

impl SharedHardware {
    pub fn new(hardware: Device) -> Self {
        let channels: Arc<[Channel]> = hardware.channels().into();
        Self {
            inner: Arc::new(Mutex::new(hardware)),
            channels,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(build_hardware(config)).with_op_timeout(config.hardware.op_timeout())
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Run one port call off the async workers.  Waiting for the lock and
    /// the call itself share the `op_timeout` budget.  A panic inside the
    /// adapter resumes in the caller.
    async fn call<T, F>(&self, target: &str, op: F) -> Result<T, HardwareError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Device) -> Result<T, HardwareError> + Send + 'static,
    {
        let timed_out = || HardwareError::Timeout {
            channel: target.to_string(),
        };
        let deadline = Instant::now() + self.op_timeout;
        let guard = tokio::time::timeout_at(deadline, Arc::clone(&self.inner).lock_owned())
            .await
            .map_err(|_| timed_out())?;
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            op(&mut guard)
        });
        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Ok(Err(_)) => Err(HardwareError::ReadFailed {
                channel: target.to_string(),
                reason: "hardware worker cancelled".to_string(),
            }),
            Err(_) => {
                warn!("hw: '{}' did not answer within {:?}", target, self.op_timeout);
                Err(timed_out())
            }
        }
    }

    pub async fn connect(&self) -> Result<(), HardwareError> {
        match self.call("connect", |hw| hw.connect()).await {
            Err(HardwareError::Timeout { .. }) => Err(HardwareError::ConnectFailed(format!(
                "no answer within {:?}",
                self.op_timeout
            ))),
            other => other,
        }
    }

    pub async fn read(&self, channel: &str) -> Result<f64, HardwareError> {
        let id = channel.to_string();
        self.call(channel, move |hw| hw.read(&id)).await
    }

    pub async fn write(&self, channel: &str, value: f64) -> Result<(), HardwareError> {
        let id = channel.to_string();
        self.call(channel, move |hw| hw.write(&id, value)).await
    }

    /// Best effort: a device that does not answer is abandoned.
    pub async fn disconnect(&self) {
        let released = self
            .call("disconnect", |hw| {
                hw.disconnect();
                Ok(())
            })
            .await;
        if let Err(e) = released {
            warn!("hw: disconnect abandoned: {}", e);
        }
    }

    pub async fn health(&self) -> Result<HealthReport, HardwareError> {
        self.call("health", |hw| Ok(hw.health())).await
    }

    /// Channel table, fixed at construction.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_output())
    }
}
