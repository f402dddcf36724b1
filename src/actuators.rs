//! Actuator loop: pull pending commands from the backend and apply them.
//!
//! `GET /events` lists backend events; those carrying a `pending_command`
//! are resolved to local output channels by `event_public_id` and written
//! one by one.  A failed write affects only its own channel and is retried
//! on the next poll while the backend still reports it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::adapters::SharedHardware;
use crate::app::commands::Command;
use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;
use crate::client::ResilientClient;
use crate::config::ActuatorConfig;
use crate::error::{ClientError, FatalError};

#[derive(Debug, Clone, Deserialize)]
pub struct PendingCommand {
    pub value: f64,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendEvent {
    pub public_id: String,
    #[serde(default)]
    pub pending_command: Option<PendingCommand>,
}

/// `/events` is served either as a bare array or wrapped in an object.
/// Entries stay raw here so one bad entry cannot sink the rest.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventsResponse {
    List(Vec<serde_json::Value>),
    Wrapped { events: Vec<serde_json::Value> },
}

/// Decoded `/events` payload.
#[derive(Debug, Default)]
pub struct EventList {
    pub events: Vec<BackendEvent>,
    /// Entries that did not decode as a [`BackendEvent`].
    pub malformed: usize,
}

impl From<EventsResponse> for EventList {
    fn from(r: EventsResponse) -> Self {
        let raw = match r {
            EventsResponse::List(v) | EventsResponse::Wrapped { events: v } => v,
        };
        let mut list = EventList::default();
        for entry in raw {
            match serde_json::from_value::<BackendEvent>(entry) {
                Ok(event) => list.events.push(event),
                Err(e) => {
                    warn!("actuators: skipping malformed event: {}", e);
                    list.malformed += 1;
                }
            }
        }
        list
    }
}

/// Per-poll counts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollReport {
    pub applied: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: usize,
}

pub struct ActuatorManager {
    hardware: SharedHardware,
    client: Arc<ResilientClient>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    commands_path: String,
    /// `event_public_id` -> output channel id.
    routes: HashMap<String, String>,
    /// Channels driven by a local rule.
    rule_owned: HashSet<String>,
    /// `issued_at` of the last command applied per channel.
    applied: HashMap<String, DateTime<Utc>>,
}

impl ActuatorManager {
    pub fn new(
        config: &ActuatorConfig,
        hardware: SharedHardware,
        client: Arc<ResilientClient>,
        sink: Arc<dyn EventSink>,
        rule_owned: impl IntoIterator<Item = String>,
    ) -> Self {
        let routes = hardware
            .outputs()
            .map(|c| (c.event_id().to_string(), c.id.clone()))
            .collect();
        Self {
            hardware,
            client,
            sink,
            interval: config.poll_interval(),
            commands_path: config.commands_path.clone(),
            routes,
            rule_owned: rule_owned.into_iter().collect(),
            applied: HashMap::new(),
        }
    }

    pub async fn fetch(&self) -> Result<EventList, ClientError> {
        let response: EventsResponse = self.client.get_json(&self.commands_path).await?;
        Ok(response.into())
    }

    /// Turn backend events into commands for channels this loop may drive.
    pub fn resolve(&self, events: Vec<BackendEvent>) -> (Vec<Command>, usize) {
        let mut commands = Vec::new();
        let mut skipped = 0;
        for event in events {
            let Some(pending) = event.pending_command else {
                continue;
            };
            let Some(channel) = self.routes.get(&event.public_id) else {
                debug!(
                    "actuators: no output channel for event '{}'",
                    event.public_id
                );
                skipped += 1;
                continue;
            };
            if self.rule_owned.contains(channel) {
                warn!(
                    "actuators: '{}' is driven by a local rule, ignoring backend command",
                    channel
                );
                skipped += 1;
                continue;
            }
            if self.applied.get(channel) == Some(&pending.issued_at) {
                skipped += 1;
                continue;
            }
            commands.push(Command {
                channel: channel.clone(),
                value: pending.value,
                issued_at: pending.issued_at,
            });
        }
        (commands, skipped)
    }

    pub async fn apply(&mut self, commands: Vec<Command>) -> PollReport {
        let mut report = PollReport::default();
        for cmd in commands {
            match self.hardware.write(&cmd.channel, cmd.value).await {
                Ok(()) => {
                    self.applied.insert(cmd.channel.clone(), cmd.issued_at);
                    self.sink.emit(&AgentEvent::CommandApplied {
                        channel: cmd.channel.clone(),
                        value: cmd.value,
                    });
                    report.applied.push(cmd.channel);
                }
                Err(e) => {
                    self.sink.emit(&AgentEvent::CommandFailed {
                        channel: cmd.channel.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push(cmd.channel);
                }
            }
        }
        report
    }

    pub async fn poll(&mut self) -> PollReport {
        let list = match self.fetch().await {
            Ok(list) => list,
            Err(e) => {
                self.sink.emit(&AgentEvent::CommandFetchFailed {
                    error: e.to_string(),
                });
                return PollReport::default();
            }
        };
        let (commands, skipped) = self.resolve(list.events);
        let mut report = self.apply(commands).await;
        report.skipped = skipped + list.malformed;
        report
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), FatalError> {
        info!(
            "actuators: polling {} every {:?} for {} outputs",
            self.commands_path,
            self.interval,
            self.routes.len()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.poll() => {}
            }
        }
        info!("actuators: stopped");
        Ok(())
    }
}
