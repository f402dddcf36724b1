//! Orchestrator: owns the task group and its lifecycle.
//!
//! ```text
//!   connect hardware ──✗──▶ FatalError::HardwareConnect (no task started)
//!         │
//!         ▼
//!   JoinSet { sensors, actuators, rules, health }  ◀── CancellationToken
//!         │
//!         ├─ shutdown signal ──▶ cancel ──▶ grace ──▶ abort stragglers
//!         └─ task exits early ──▶ cancel siblings ──▶ FatalError::TaskFailed
//!         ▼
//!   disconnect hardware
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::actuators::ActuatorManager;
use crate::adapters::SharedHardware;
use crate::app::commands::RuleUpdate;
use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;
use crate::client::ResilientClient;
use crate::config::AgentConfig;
use crate::diagnostics::Diagnostics;
use crate::error::FatalError;
use crate::rules::LocalRuleEngine;
use crate::sensors::SensorManager;

pub struct Orchestrator {
    config: AgentConfig,
    hardware: SharedHardware,
    client: Arc<ResilientClient>,
    diagnostics: Arc<Diagnostics>,
    rules: LocalRuleEngine,
}

struct TaskGroup {
    set: JoinSet<Result<(), FatalError>>,
    names: HashMap<Id, &'static str>,
}

impl TaskGroup {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), FatalError>> + Send + 'static,
    {
        let handle = self.set.spawn(task);
        self.names.insert(handle.id(), name);
    }

    fn name(&self, id: Id) -> &'static str {
        self.names.get(&id).copied().unwrap_or("unknown")
    }

    /// Wait for the next task to end and describe how.
    async fn next(&mut self) -> Option<(&'static str, Result<(), String>)> {
        let joined = self.set.join_next_with_id().await?;
        Some(match joined {
            Ok((id, Ok(()))) => (self.name(id), Ok(())),
            Ok((id, Err(e))) => (self.name(id), Err(e.to_string())),
            Err(e) if e.is_panic() => (self.name(e.id()), Err("panicked".to_string())),
            Err(e) => (self.name(e.id()), Err("aborted".to_string())),
        })
    }
}

impl Orchestrator {
    /// Build the task set.  Nothing runs and the hardware stays untouched
    /// until [`run`](Self::run).
    pub fn new(
        config: AgentConfig,
        hardware: SharedHardware,
        client: Arc<ResilientClient>,
        diagnostics: Arc<Diagnostics>,
    ) -> Result<Self, FatalError> {
        let sink: Arc<dyn EventSink> = diagnostics.clone();
        let rules = LocalRuleEngine::new(
            &config.rules.rules,
            hardware.clone(),
            sink,
            Duration::from_millis(config.rules.tick_ms),
        )?;
        Ok(Self {
            config,
            hardware,
            client,
            diagnostics,
            rules,
        })
    }

    /// Runtime reconfiguration of the local rules.
    pub fn rule_updates(&self) -> mpsc::Sender<RuleUpdate> {
        self.rules.updates()
    }

    /// Run until `shutdown` fires or a task fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), FatalError> {
        let Self {
            config,
            hardware,
            client,
            diagnostics,
            rules,
        } = self;

        hardware
            .connect()
            .await
            .map_err(FatalError::HardwareConnect)?;

        let sink: Arc<dyn EventSink> = diagnostics.clone();
        sink.emit(&AgentEvent::Started {
            mode: config.hardware.mode,
        });

        let cancel = shutdown.child_token();
        let mut group = TaskGroup::new();

        let sensors = SensorManager::new(
            &config.sensors,
            hardware.clone(),
            Arc::clone(&client),
            Arc::clone(&sink),
        );
        group.spawn("sensors", sensors.run(cancel.clone()));

        let actuators = ActuatorManager::new(
            &config.actuators,
            hardware.clone(),
            Arc::clone(&client),
            Arc::clone(&sink),
            config.rules.rules.iter().map(|r| r.channel.clone()),
        );
        group.spawn("actuators", actuators.run(cancel.clone()));

        group.spawn("rules", rules.run(cancel.clone()));

        group.spawn(
            "health",
            report_health(
                hardware.clone(),
                Arc::clone(&diagnostics),
                Duration::from_secs(config.orchestrator.health_interval_secs),
                cancel.clone(),
            ),
        );

        let mut outcome = Ok(());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("orchestrator: shutdown requested");
            }
            Some((task, result)) = group.next() => {
                let reason = match result {
                    Ok(()) => "exited before shutdown".to_string(),
                    Err(e) => e,
                };
                error!("orchestrator: task '{}' {}, stopping siblings", task, reason);
                sink.emit(&AgentEvent::TaskFailed {
                    task,
                    error: reason.clone(),
                });
                outcome = Err(FatalError::TaskFailed { task, reason });
            }
        }

        cancel.cancel();
        let grace = Duration::from_millis(config.orchestrator.shutdown_grace_ms);
        drain(&mut group, grace).await;
        hardware.disconnect().await;
        sink.emit(&AgentEvent::Stopped);
        outcome
    }
}

/// Give tasks the grace period to finish, then abort the rest.
async fn drain(group: &mut TaskGroup, grace: Duration) {
    let finished = tokio::time::timeout(grace, async {
        while let Some((task, result)) = group.next().await {
            if let Err(e) = result {
                warn!("orchestrator: '{}' ended with error during shutdown: {}", task, e);
            }
        }
    })
    .await;
    if finished.is_err() {
        warn!(
            "orchestrator: {} tasks still running after {:?}, aborting",
            group.set.len(),
            grace
        );
        group.set.abort_all();
        while group.set.join_next().await.is_some() {}
    }
}

/// Periodic health summary.
async fn report_health(
    hardware: SharedHardware,
    diagnostics: Arc<Diagnostics>,
    every: Duration,
    cancel: CancellationToken,
) -> Result<(), FatalError> {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately; the first report comes one period in.
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {
                match hardware.health().await {
                    Ok(report) => {
                        let summary = diagnostics.snapshot(&report);
                        diagnostics.emit(&AgentEvent::Health(summary));
                    }
                    Err(e) => warn!("health: hardware did not report: {}", e),
                }
            }
        }
    }
}
