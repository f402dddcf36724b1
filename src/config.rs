//! Agent configuration
//!
//! Loaded once at startup from a TOML file, then overridden from the
//! environment.  Every section has sane defaults so a minimal file only
//! needs the backend credentials and channel list.

use core::fmt;
use core::str::FromStr;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::ConfigError;

/// Environment variables that override file values.
pub const ENV_BACKEND_URL: &str = "EDGE_AGENT_BACKEND_URL";
pub const ENV_USERNAME: &str = "EDGE_AGENT_USERNAME";
pub const ENV_PASSWORD: &str = "EDGE_AGENT_PASSWORD";
pub const ENV_HARDWARE_MODE: &str = "EDGE_AGENT_HARDWARE_MODE";

/// Top-level agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub backend: BackendConfig,
    pub retry: RetryConfig,
    pub hardware: HardwareConfig,
    pub sensors: SensorConfig,
    pub actuators: ActuatorConfig,
    pub rules: RulesConfig,
    pub orchestrator: OrchestratorConfig,
    pub channels: Vec<Channel>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub login_path: String,
    /// Per-attempt HTTP timeout (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            username: String::new(),
            password: String::new(),
            login_path: "/auth/login".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_path", &self.login_path)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first one for transient failures.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    /// Overall budget for one call including retries (milliseconds)
    pub deadline_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
            deadline_ms: 30_000,
        }
    }
}

/// Hardware variant, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    Real,
    #[default]
    Simulated,
    Demo,
}

impl fmt::Display for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Simulated => write!(f, "simulated"),
            Self::Demo => write!(f, "demo"),
        }
    }
}

impl FromStr for HardwareMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "simulated" | "sim" => Ok(Self::Simulated),
            "demo" => Ok(Self::Demo),
            other => Err(ConfigError::Validation(format!(
                "unknown hardware mode '{other}' (expected real|simulated|demo)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub mode: HardwareMode,
    /// Seed for simulated channel values.
    pub seed: u64,
    /// Root that real-mode channel paths are resolved against.
    pub sysfs_root: String,
    /// Upper bound on one device operation before it fails with
    /// `HardwareError::Timeout`.
    pub op_timeout_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            mode: HardwareMode::Simulated,
            seed: 42,
            sysfs_root: "/sys".to_string(),
            op_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub poll_interval_ms: u64,
    pub batch_path: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            batch_path: "/datapoints/batch".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub poll_interval_ms: u64,
    pub commands_path: String,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            commands_path: "/events".to_string(),
        }
    }
}

/// One valve duty-cycling rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    /// Output channel driven by this rule.
    pub channel: String,
    pub on_duration_secs: f64,
    pub off_duration_secs: f64,
    #[serde(default = "default_on_value")]
    pub on_value: f64,
    #[serde(default)]
    pub off_value: f64,
}

fn default_on_value() -> f64 {
    1.0
}

impl RuleConfig {
    pub fn new(name: &str, channel: &str, on_secs: f64, off_secs: f64) -> Self {
        Self {
            name: name.to_string(),
            channel: channel.to_string(),
            on_duration_secs: on_secs,
            off_duration_secs: off_secs,
            on_value: default_on_value(),
            off_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub tick_ms: u64,
    #[serde(rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub shutdown_grace_ms: u64,
    pub health_interval_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 5_000,
            health_interval_secs: 60,
        }
    }
}

impl AgentConfig {
    /// Read and parse a TOML file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend.base_url = url;
        }
        if let Some(user) = lookup(ENV_USERNAME) {
            self.backend.username = user;
        }
        if let Some(pass) = lookup(ENV_PASSWORD) {
            self.backend.password = pass;
        }
        if let Some(mode) = lookup(ENV_HARDWARE_MODE) {
            self.hardware.mode = mode.parse()?;
        }
        Ok(())
    }

    /// Reject invalid values. Nothing is silently clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Validation(msg));

        reqwest::Url::parse(&self.backend.base_url).map_err(|e| {
            ConfigError::Validation(format!("backend.base_url '{}': {e}", self.backend.base_url))
        })?;
        if self.backend.request_timeout_ms == 0 {
            return fail("backend.request_timeout_ms must be > 0".into());
        }
        if self.hardware.op_timeout_ms == 0 {
            return fail("hardware.op_timeout_ms must be > 0".into());
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return fail("retry.base_delay_ms must not exceed retry.max_delay_ms".into());
        }
        if self.retry.deadline_ms == 0 {
            return fail("retry.deadline_ms must be > 0".into());
        }
        if self.sensors.poll_interval_ms == 0 || self.actuators.poll_interval_ms == 0 {
            return fail("poll intervals must be > 0".into());
        }
        if self.rules.tick_ms == 0 {
            return fail("rules.tick_ms must be > 0".into());
        }
        if self.orchestrator.health_interval_secs == 0 {
            return fail("orchestrator.health_interval_secs must be > 0".into());
        }

        let mut ids = HashSet::new();
        for ch in &self.channels {
            if ch.id.is_empty() {
                return fail("channel id must not be empty".into());
            }
            if !ids.insert(ch.id.as_str()) {
                return fail(format!("duplicate channel id '{}'", ch.id));
            }
            if ch.calibration.scale == 0.0 || !ch.calibration.scale.is_finite() {
                return fail(format!("channel '{}': calibration.scale must be non-zero", ch.id));
            }
            if let (Some(lo), Some(hi)) = (ch.min, ch.max) {
                if lo > hi {
                    return fail(format!("channel '{}': min > max", ch.id));
                }
            }
            if self.hardware.mode == HardwareMode::Real && ch.path.is_none() {
                return fail(format!("channel '{}': real mode requires a path", ch.id));
            }
        }

        let mut rule_names = HashSet::new();
        let mut rule_channels = HashSet::new();
        for rule in &self.rules.rules {
            if !rule_names.insert(rule.name.as_str()) {
                return fail(format!("duplicate rule name '{}'", rule.name));
            }
            let Some(ch) = self.channels.iter().find(|c| c.id == rule.channel) else {
                return fail(format!(
                    "rule '{}' references unknown channel '{}'",
                    rule.name, rule.channel
                ));
            };
            if !ch.is_output() {
                return fail(format!(
                    "rule '{}' must drive an output channel, '{}' is an input",
                    rule.name, rule.channel
                ));
            }
            if !rule_channels.insert(rule.channel.as_str()) {
                return fail(format!("channel '{}' bound to more than one rule", rule.channel));
            }
            let valid = |d: f64| d.is_finite() && d > 0.0;
            if !valid(rule.on_duration_secs) || !valid(rule.off_duration_secs) {
                return fail(format!("rule '{}': durations must be > 0", rule.name));
            }
        }
        Ok(())
    }
}

impl HardwareConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ActuatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
