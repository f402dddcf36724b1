//! Sensor loop: periodic acquisition and batch upload.
//!
//! Each tick reads every input channel through the shared hardware handle.
//! A failing channel is reported and skipped; the rest are still batched.
//! The batch goes out in one `POST`; if the client gives up on it, the batch
//! is dropped and the next tick starts fresh.

pub mod batch;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::adapters::SharedHardware;
use crate::app::events::AgentEvent;
use crate::app::ports::EventSink;
use crate::client::ResilientClient;
use crate::config::SensorConfig;
use crate::error::{FatalError, HardwareError};
pub use batch::{Datapoint, DatapointBatch, Reading};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    pub read: usize,
    pub failed: Vec<String>,
    pub delivered: bool,
}

pub struct SensorManager {
    hardware: SharedHardware,
    client: Arc<ResilientClient>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
    batch_path: String,
}

impl SensorManager {
    pub fn new(
        config: &SensorConfig,
        hardware: SharedHardware,
        client: Arc<ResilientClient>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            hardware,
            client,
            sink,
            interval: config.poll_interval(),
            batch_path: config.batch_path.clone(),
        }
    }

    /// Read every input channel once.  Never fails as a whole.
    pub async fn collect(&self) -> (Vec<Reading>, Vec<(String, HardwareError)>) {
        let mut readings = Vec::new();
        let mut failures = Vec::new();
        for ch in self.hardware.inputs() {
            match self.hardware.read(&ch.id).await {
                Ok(value) if value.is_finite() => readings.push(Reading {
                    channel: ch.id.clone(),
                    event_public_id: ch.event_id().to_string(),
                    value,
                    timestamp: Utc::now(),
                }),
                Ok(value) => failures.push((
                    ch.id.clone(),
                    HardwareError::ReadFailed {
                        channel: ch.id.clone(),
                        reason: format!("non-finite value {value}"),
                    },
                )),
                Err(e) => failures.push((ch.id.clone(), e)),
            }
        }
        (readings, failures)
    }

    pub async fn tick(&self) -> TickReport {
        self.sink.emit(&AgentEvent::SensorTick);
        let (readings, failures) = self.collect().await;

        let mut report = TickReport {
            read: readings.len(),
            ..TickReport::default()
        };
        for (channel, e) in failures {
            self.sink.emit(&AgentEvent::ChannelReadFailed {
                channel: channel.clone(),
                error: e.to_string(),
            });
            report.failed.push(channel);
        }

        let batch: DatapointBatch = readings.into_iter().collect();
        if batch.is_empty() {
            debug!("sensors: nothing to send this tick");
            return report;
        }

        let n = batch.len();
        match self.client.post_json(&self.batch_path, &batch).await {
            Ok(_) => {
                self.sink.emit(&AgentEvent::BatchSent { datapoints: n });
                report.delivered = true;
            }
            Err(e) => self.sink.emit(&AgentEvent::BatchDropped {
                datapoints: n,
                error: e.to_string(),
            }),
        }
        report
    }

    /// Tick at the configured interval until `cancel` fires.  A tick in
    /// progress is abandoned at its next await point.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), FatalError> {
        info!(
            "sensors: polling {} inputs every {:?}",
            self.hardware.inputs().count(),
            self.interval
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
                _ = self.tick() => {}
            }
        }
        info!("sensors: stopped");
        Ok(())
    }
}
