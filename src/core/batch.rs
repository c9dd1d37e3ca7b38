use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::{core::gauge::MetricRecord, error::Error};

pub const APP_NAME: &str = "solar";

/// One poll cycle worth of metrics in the Metric API shape.
#[must_use]
#[derive(Clone, Debug, Serialize, Builder)]
pub struct MetricBatch {
    pub common: Common,
    pub metrics: Vec<MetricRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Common {
    #[serde(serialize_with = "serialize_timestamp_millis")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "interval.ms")]
    pub interval_millis: u64,

    pub attributes: Attributes,
}

#[derive(Clone, Debug, Serialize)]
pub struct Attributes {
    #[serde(rename = "app.name")]
    pub app_name: &'static str,

    /// Rendered operation mode.
    pub mode: String,

    /// Rendered grid status.
    pub status: String,

    /// Duplicates [`Common::timestamp`].
    #[serde(serialize_with = "serialize_timestamp_millis")]
    pub poll_timestamp: DateTime<Utc>,
}

impl MetricBatch {
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.common.timestamp
    }

    /// Reject the batch if any value is `NaN` or infinite.
    pub fn ensure_finite(self) -> Result<Self, Error> {
        match self.metrics.iter().find(|record| !record.value.is_finite()) {
            Some(record) => Err(Error::NonFiniteMetric { name: record.name.clone() }),
            None => Ok(self),
        }
    }

    /// Serialize into the request body: the Metric API accepts an array of batches.
    pub fn to_request_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&[self])
    }
}

fn serialize_timestamp_millis<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(timestamp.timestamp_millis())
}
