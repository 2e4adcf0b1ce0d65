//! Test configuration, results and runtime information.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::run::Run;
use super::FieldMap;

/// Status recorded when the result report is absent or empty.
pub const STATUS_UNKNOWN: &str = "UNKNOWN";

/// How the test was configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestConfiguration {
    /// Iterations the harness was asked to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations_requested: Option<u32>,
    /// Benchmark parameters (free-form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<FieldMap>,
    /// Environment variables the test ran with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
    /// Tuning knobs (free-form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<FieldMap>,
}

/// Headline metric of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryMetric {
    /// Metric name as found in the run metrics.
    pub name: String,
    /// Mean across runs.
    pub value: f64,
    /// Best-effort unit guess.
    pub unit: String,
}

/// Descriptive statistics across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
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
    /// Sample standard deviation; `0.0` for a single sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    /// Sample variance; only for more than one sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<f64>,
    /// Number of samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,
    /// 95th percentile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_95: Option<f64>,
    /// 99th percentile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_99: Option<f64>,
}

impl StatisticalSummary {
    /// Compute mean, median, extremes and sample variance.
    ///
    /// Returns `None` for an empty slice. A single sample has zero spread.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len();
        let mean = mean(values);
        let (variance, stddev) = if n > 1 {
            let var = sample_variance(values, mean);
            (Some(var), Some(var.sqrt()))
        } else {
            (None, Some(0.0))
        };

        Some(Self {
            mean: Some(mean),
            median: Some(median(values)),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            stddev,
            variance,
            sample_count: Some(n as u64),
            percentile_95: None,
            percentile_99: None,
        })
    }
}

/// Runtime details of the harness invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// When the first run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// When the last run ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Wall-clock duration of the whole test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Command line that launched the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Directory the command ran in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// User that ran the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Test results: overall status, derived statistics and the runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// `PASS`, `FAIL`, or whatever the report said.
    pub status: String,
    /// Sum of run durations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_seconds: Option<f64>,
    /// Number of runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_runs: Option<u32>,
    /// Headline metric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_metric: Option<PrimaryMetric>,
    /// Statistics across runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_statistics: Option<StatisticalSummary>,
    /// Runs keyed `run_<n>`.
    #[serde(default)]
    pub runs: BTreeMap<String, Run>,
}

impl Results {
    /// Results with a status and no runs.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            execution_time_seconds: None,
            total_runs: None,
            primary_metric: None,
            overall_statistics: None,
            runs: BTreeMap::new(),
        }
    }

    /// Attach runs and derive `total_runs`, execution time, overall
    /// statistics and the primary metric from them.
    pub fn with_runs(mut self, runs: BTreeMap<String, Run>) -> Self {
        self.runs = runs;
        self.derive_statistics();
        self
    }

    /// Recompute every derived field from the current runs.
    pub fn derive_statistics(&mut self) {
        self.total_runs = Some(self.runs.len() as u32);

        let total_duration: f64 = self.runs.values().filter_map(|r| r.duration_seconds).sum();
        self.execution_time_seconds = (total_duration > 0.0).then_some(total_duration);

        let samples: Vec<f64> = self
            .runs
            .values()
            .filter_map(|run| run.first_numeric_metric().map(|(_, v)| v))
            .collect();
        self.overall_statistics = StatisticalSummary::from_values(&samples);

        self.primary_metric = self.runs.values().next().and_then(|first| {
            let (name, _) = first.first_numeric_metric()?;
            let mean = self.overall_statistics.as_ref()?.mean?;
            Some(PrimaryMetric {
                name: name.to_string(),
                value: mean,
                unit: guess_unit(name).to_string(),
            })
        });
    }
}

/// Guess a display unit from a metric name.
pub fn guess_unit(metric_name: &str) -> &'static str {
    let name = metric_name.to_lowercase();
    if name.contains("per_sec") || name.contains("per_second") {
        "per_second"
    } else if name.contains("seconds") || name.contains("time") {
        "seconds"
    } else if name.contains("bytes") || name.contains("bandwidth") {
        "bytes/sec"
    } else if name.contains("iops") {
        "IOPS"
    } else {
        "unit"
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub(crate) fn sample_variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}
