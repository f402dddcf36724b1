//! Local rule engine: time-based ON/OFF cycling of output channels.
//!
//! Runs independently of the backend: rule transitions are written
//! straight to the hardware handle, so valves keep cycling through a
//! network outage.
//!
//! ```text
//!   RuleUpdate ──▶ mpsc ──┐
//!                         ▼
//!   interval(tick) ──▶ LocalRuleEngine ──▶ CycleState::advance ──▶ SharedHardware::write
//! ```
//!
//! Every rule channel is driven to its OFF value on start and again on
//! shutdown.

pub mod cycle;

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::adapters::SharedHardware;
use crate::app::commands::RuleUpdate;
use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;
use crate::config::RuleConfig;
use crate::error::{ConfigError, FatalError};
pub use cycle::{CyclePhase, CycleState};

const UPDATE_QUEUE: usize = 16;

struct ActiveRule {
    name: String,
    channel: String,
    on_value: f64,
    off_value: f64,
    cycle: CycleState,
    /// The hardware does not yet reflect the current phase.
    needs_write: bool,
}

impl ActiveRule {
    fn target(&self) -> f64 {
        match self.cycle.phase() {
            CyclePhase::On => self.on_value,
            CyclePhase::Off => self.off_value,
        }
    }
}

pub struct LocalRuleEngine {
    rules: Vec<ActiveRule>,
    hardware: SharedHardware,
    sink: Arc<dyn EventSink>,
    tick: Duration,
    updates_tx: mpsc::Sender<RuleUpdate>,
    updates_rx: mpsc::Receiver<RuleUpdate>,
}

fn secs(value: f64, rule: &str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::Validation(format!("rule '{rule}': {e}")))
}

impl LocalRuleEngine {
    pub fn new(
        rules: &[RuleConfig],
        hardware: SharedHardware,
        sink: Arc<dyn EventSink>,
        tick: Duration,
    ) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|r| {
                let on = secs(r.on_duration_secs, &r.name)?;
                let off = secs(r.off_duration_secs, &r.name)?;
                Ok(ActiveRule {
                    name: r.name.clone(),
                    channel: r.channel.clone(),
                    on_value: r.on_value,
                    off_value: r.off_value,
                    cycle: CycleState::new(on, off)?,
                    needs_write: true,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE);
        Ok(Self {
            rules,
            hardware,
            sink,
            tick,
            updates_tx,
            updates_rx,
        })
    }

    /// Sender for runtime reconfiguration.
    pub fn updates(&self) -> mpsc::Sender<RuleUpdate> {
        self.updates_tx.clone()
    }

    pub fn phase(&self, rule: &str) -> Option<CyclePhase> {
        self.find(rule).map(|r| r.cycle.phase())
    }

    pub fn cycle(&self, rule: &str) -> Option<&CycleState> {
        self.find(rule).map(|r| &r.cycle)
    }

    fn find(&self, rule: &str) -> Option<&ActiveRule> {
        self.rules.iter().find(|r| r.name == rule)
    }

    /// Stage an update; it applies at the rule's next boundary.
    pub fn stage(&mut self, update: RuleUpdate) -> Result<(), ConfigError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.name == update.rule)
            .ok_or_else(|| ConfigError::Validation(format!("unknown rule '{}'", update.rule)))?;
        rule.cycle
            .reconfigure(update.on_duration, update.off_duration)?;
        info!(
            "rules: '{}' -> on={:?} off={:?} at next boundary",
            rule.name, update.on_duration, update.off_duration
        );
        Ok(())
    }

    /// Advance every rule by `dt` and write whatever the hardware is
    /// missing.  A failed write stays pending for the next step.
    pub async fn step(&mut self, dt: Duration) {
        for rule in &mut self.rules {
            if let Some(phase) = rule.cycle.advance(dt) {
                self.sink.emit(&AgentEvent::RuleTransition {
                    rule: rule.name.clone(),
                    phase,
                });
                rule.needs_write = true;
            }
            if !rule.needs_write {
                continue;
            }
            match self.hardware.write(&rule.channel, rule.target()).await {
                Ok(()) => rule.needs_write = false,
                Err(e) => self.sink.emit(&AgentEvent::RuleWriteFailed {
                    rule: rule.name.clone(),
                    error: e.to_string(),
                }),
            }
        }
    }

    async fn drive_off(&mut self) {
        for rule in &self.rules {
            if let Err(e) = self.hardware.write(&rule.channel, rule.off_value).await {
                warn!("rules: could not switch '{}' off: {}", rule.name, e);
            }
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), FatalError> {
        if self.rules.is_empty() {
            info!("rules: none configured");
            cancel.cancelled().await;
            return Ok(());
        }
        info!("rules: {} rules, tick {:?}", self.rules.len(), self.tick);

        // Initial OFF write.
        self.step(Duration::ZERO).await;

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        let mut last = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(update) = self.updates_rx.recv() => {
                    if let Err(e) = self.stage(update) {
                        warn!("rules: update rejected: {}", e);
                    }
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = now - last;
                    last = now;
                    self.step(dt).await;
                }
            }
        }

        self.drive_off().await;
        info!("rules: stopped");
        Ok(())
    }
}
