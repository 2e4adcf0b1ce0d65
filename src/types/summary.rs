//! The summary view: a document with every bulk timeseries stripped.
//!
//! `SummaryRun` has no `timeseries` field at all, so a `SummaryView` cannot
//! carry per-point data. This is what the summary index stores and what the
//! content hash is computed over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metadata::{Metadata, TestInfo};
use super::results::{PrimaryMetric, Results, RuntimeInfo, StatisticalSummary, TestConfiguration};
use super::run::{Run, TimeSeriesSummary};
use super::system::SystemUnderTest;
use super::FieldMap;

/// A run without its bulk samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRun {
    /// Ordinal of the run.
    pub run_number: u64,
    /// Run status.
    pub status: String,
    /// Run start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Run end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Run duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Per-run configuration.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub configuration: FieldMap,
    /// Run-level metrics, in producer order.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metrics: FieldMap,
    /// Benchmark self-checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldMap>,
    /// Aggregates survive the split; only the points are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries_summary: Option<TimeSeriesSummary>,
}

impl From<&Run> for SummaryRun {
    fn from(run: &Run) -> Self {
        Self {
            run_number: run.run_number,
            status: run.status.clone(),
            start_time: run.start_time.clone(),
            end_time: run.end_time.clone(),
            duration_seconds: run.duration_seconds,
            configuration: run.configuration.clone(),
            metrics: run.metrics.clone(),
            validation: run.validation.clone(),
            timeseries_summary: run.timeseries_summary.clone(),
        }
    }
}

/// Results with summary runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResults {
    /// Run status.
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
    /// Runs keyed `run_<n>`, without their points.
    #[serde(default)]
    pub runs: BTreeMap<String, SummaryRun>,
}

impl From<&Results> for SummaryResults {
    fn from(results: &Results) -> Self {
        Self {
            status: results.status.clone(),
            execution_time_seconds: results.execution_time_seconds,
            total_runs: results.total_runs,
            primary_metric: results.primary_metric.clone(),
            overall_statistics: results.overall_statistics.clone(),
            runs: results
                .runs
                .iter()
                .map(|(key, run)| (key.clone(), SummaryRun::from(run)))
                .collect(),
        }
    }
}

/// One row per test result, as indexed by the summary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    /// Identity and provenance.
    pub metadata: Metadata,
    /// Benchmark name and version.
    pub test: TestInfo,
    /// Hardware, OS and tuning of the measured host.
    #[serde(default)]
    pub system_under_test: SystemUnderTest,
    /// Requested parameters.
    #[serde(default)]
    pub test_configuration: TestConfiguration,
    /// Results without timeseries points.
    pub results: SummaryResults,
    /// How the test was invoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_info: Option<RuntimeInfo>,
}

impl SummaryView {
    /// Document ID of the summarized document.
    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }
}
