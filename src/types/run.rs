//! Runs and their bulk timeseries samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::results::{mean, median, sample_variance};
use super::FieldMap;

/// One bulk time-stamped sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// ISO-8601 timestamp taken from the source data, never synthesized.
    pub timestamp: String,
    /// Flat named measurements, e.g. `{"iterations_per_second": 193245.2}`.
    #[serde(default)]
    pub metrics: FieldMap,
}

impl TimeSeriesPoint {
    /// Create a point with no metrics.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            metrics: FieldMap::new(),
        }
    }

    /// Add a metric (builder style).
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }
}

/// Aggregate statistics over a run's points. Derived, never authoritative.
///
/// Every field is optional so partial summaries from other producers load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSummary {
    /// Number of points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Arithmetic mean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Middle value; average of the two middle values for even counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    /// Smallest value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Largest value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Sample standard deviation; only for more than one point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    /// Value of the first point in sample order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_value: Option<f64>,
    /// Value of the last point in sample order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<f64>,
}

impl TimeSeriesSummary {
    /// Summarize values in sample order. `None` when empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let (&first_value, &last_value) = (values.first()?, values.last()?);
        let mean = mean(values);
        Some(Self {
            count: Some(values.len() as u64),
            mean: Some(mean),
            median: Some(median(values)),
            min: Some(values.iter().copied().fold(f64::INFINITY, f64::min)),
            max: Some(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            stddev: (values.len() > 1).then(|| sample_variance(values, mean).sqrt()),
            first_value: Some(first_value),
            last_value: Some(last_value),
        })
    }
}

/// One logical execution within a document's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run number, matching the `run_<n>` key it is stored under.
    pub run_number: u64,
    /// Run status.
    pub status: String,
    /// Timestamp of the first sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Timestamp at which the last sample finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Run duration as reported by the benchmark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Free-form run configuration.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub configuration: FieldMap,
    /// Free-form measurements; values may be numeric or nested.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metrics: FieldMap,
    /// Self-checks reported by the tool (e.g. CRCs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldMap>,
    /// Aggregates over `timeseries`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries_summary: Option<TimeSeriesSummary>,
    /// Bulk samples keyed `sequence_<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries: Option<BTreeMap<String, TimeSeriesPoint>>,
}

impl Run {
    /// Create an empty run.
    pub fn new(run_number: u64, status: impl Into<String>) -> Self {
        Self {
            run_number,
            status: status.into(),
            start_time: None,
            end_time: None,
            duration_seconds: None,
            configuration: FieldMap::new(),
            metrics: FieldMap::new(),
            validation: None,
            timeseries_summary: None,
            timeseries: None,
        }
    }

    /// First metric, in insertion order, whose value is a JSON number.
    pub fn first_numeric_metric(&self) -> Option<(&str, f64)> {
        self.metrics
            .iter()
            .find_map(|(name, value)| value.as_f64().map(|v| (name.as_str(), v)))
    }

    /// Number of bulk samples on this run.
    pub fn point_count(&self) -> usize {
        self.timeseries.as_ref().map_or(0, BTreeMap::len)
    }
}
