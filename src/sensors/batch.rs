//! Readings and the batch wire format.
//!
//! ```json
//! { "datapoints": [ { "value": 21.5, "event_public_id": "tank-temp" } ] }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successful channel read.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub channel: String,
    pub event_public_id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub value: f64,
    pub event_public_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatapointBatch {
    pub datapoints: Vec<Datapoint>,
}

impl DatapointBatch {
    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }
}

impl FromIterator<Reading> for DatapointBatch {
    fn from_iter<I: IntoIterator<Item = Reading>>(iter: I) -> Self {
        Self {
            datapoints: iter
                .into_iter()
                .map(|r| Datapoint {
                    value: r.value,
                    event_public_id: r.event_public_id,
                })
                .collect(),
        }
    }
}
