//! Real hardware adapter: Linux sysfs / IIO attribute files.
//!
//! Each channel names an attribute file relative to `sysfs_root`:
//!
//! | Channel kind  | Typical path                                   |
//! |---------------|------------------------------------------------|
//! | ADC input     | `bus/iio/devices/iio:device0/in_voltage0_raw`  |
//! | GPIO output   | `class/gpio/gpio17/value`                       |
//! | PWM output    | `class/pwm/pwmchip0/pwm0/duty_cycle`            |
//!
//! Reads parse the trimmed file contents and apply the channel
//! calibration; writes invert it.  Every device fault is returned as a
//! [`HardwareError`]; nothing here panics on bad device data.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{HardwareInterface, HealthReport, HealthTracker};
use crate::channel::{self, Channel, Direction};
use crate::config::HardwareMode;
use crate::error::HardwareError;

pub struct RealHardware {
    root: PathBuf,
    channels: Vec<Channel>,
    health: HealthTracker,
    connected: bool,
}

impl RealHardware {
    pub fn new(root: impl Into<PathBuf>, channels: Vec<Channel>) -> Self {
        let health = HealthTracker::new(&channels);
        Self {
            root: root.into(),
            channels,
            health,
            connected: false,
        }
    }

    fn path_of(&self, ch: &Channel) -> Result<PathBuf, HardwareError> {
        ch.path
            .as_deref()
            .map(|p| self.root.join(p))
            .ok_or_else(|| HardwareError::ReadFailed {
                channel: ch.id.clone(),
                reason: "no sysfs path configured".to_string(),
            })
    }

    fn read_inner(&self, id: &str) -> Result<f64, HardwareError> {
        let ch = self
            .channels
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| HardwareError::UnknownChannel(id.to_string()))?;
        let path = self.path_of(ch)?;
        let text = fs::read_to_string(&path).map_err(|e| io_fault(id, &e, false))?;
        let raw: f64 = text.trim().parse().map_err(|_| HardwareError::ReadFailed {
            channel: id.to_string(),
            reason: format!("unparseable value '{}'", text.trim()),
        })?;
        Ok(ch.calibration.apply(raw))
    }

    fn write_inner(&self, id: &str, value: f64) -> Result<(), HardwareError> {
        let ch = channel::lookup(&self.channels, id, Direction::Output)?;
        ch.check_output(value)?;
        let path = self.path_of(ch)?;
        let raw = ch.calibration.invert(value);
        fs::write(&path, format_raw(raw)).map_err(|e| io_fault(id, &e, true))
    }
}

/// Integral values are written without a decimal point; GPIO `value`
/// files reject `1.0`.
fn format_raw(raw: f64) -> String {
    if raw.fract() == 0.0 && raw.abs() < 1e15 {
        format!("{}", raw as i64)
    } else {
        format!("{raw}")
    }
}

fn io_fault(channel: &str, e: &io::Error, write: bool) -> HardwareError {
    if e.kind() == io::ErrorKind::TimedOut {
        return HardwareError::Timeout {
            channel: channel.to_string(),
        };
    }
    let reason = e.to_string();
    let channel = channel.to_string();
    if write {
        HardwareError::WriteFailed { channel, reason }
    } else {
        HardwareError::ReadFailed { channel, reason }
    }
}

impl HardwareInterface for RealHardware {
    fn connect(&mut self) -> Result<(), HardwareError> {
        if !Path::new(&self.root).is_dir() {
            return Err(HardwareError::ConnectFailed(format!(
                "sysfs root {} not found",
                self.root.display()
            )));
        }
        let missing: Vec<String> = self
            .channels
            .iter()
            .filter(|c| {
                c.path
                    .as_deref()
                    .is_none_or(|p| !self.root.join(p).exists())
            })
            .map(|c| c.id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(HardwareError::ConnectFailed(format!(
                "missing device attributes for: {}",
                missing.join(", ")
            )));
        }
        self.connected = true;
        info!(
            "hw: connected to {} ({} channels)",
            self.root.display(),
            self.channels.len()
        );
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
        if let Err(e) = &result {
            warn!("hw: {}", e);
        }
        self.health.observe(channel, result)
    }

    fn disconnect(&mut self) {
        if self.connected {
            info!("hw: released {}", self.root.display());
        }
        self.connected = false;
    }

    fn health(&self) -> HealthReport {
        self.health.report(HardwareMode::Real, self.connected)
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }
}
