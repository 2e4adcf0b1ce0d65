//! Denormalized timeseries documents.
//!
//! Each document carries one `(run, sequence)` sample plus full copies of the
//! parent's test info and SUT, so it can be queried without a join.

use serde::{Deserialize, Serialize};

use super::metadata::TestInfo;
use super::system::SystemUnderTest;
use super::FieldMap;

/// Identity of one sample and the provenance copied from its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesMetadata {
    /// Parent document ID.
    pub document_id: String,
    /// `{document_id}_{run_key}_{sequence_key}`.
    pub timeseries_id: String,
    /// Sample timestamp.
    pub timestamp: String,
    /// Integer parsed from the sequence key.
    pub sequence: u64,
    /// When the benchmark ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_timestamp: Option<String>,
    /// When the parent was processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_timestamp: Option<String>,
    /// Provenance copied from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_vendor: Option<String>,
    /// Provenance copied from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    /// Provenance copied from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Provenance copied from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    /// Provenance copied from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

/// Run context of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRun {
    /// e.g. `run_0`.
    pub run_key: String,
    /// Ordinal of the run.
    pub run_number: u64,
    /// Run status.
    pub status: String,
    /// Run configuration, when not empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<FieldMap>,
    /// Set for suites that report many benchmarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_name: Option<String>,
    /// Description for suite benchmarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_description: Option<String>,
}

/// The single measurement of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResults {
    /// Run the sample belongs to.
    pub run: TimeSeriesRun,
    /// Scalar chosen from the point's metrics.
    pub value: f64,
    /// Inferred unit; `"unknown"` when nothing matched.
    pub unit: String,
    /// Point metrics other than the one used as `value`.
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    pub point_metrics: FieldMap,
}

/// A standalone document for one timeseries sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDocument {
    /// Identity and provenance.
    pub metadata: TimeSeriesMetadata,
    /// Copy of the parent test info.
    pub test: TestInfo,
    /// Copy of the parent SUT.
    pub system_under_test: SystemUnderTest,
    /// The sample itself.
    pub results: TimeSeriesResults,
}

impl TimeSeriesDocument {
    /// Bulk-index ID of this sample.
    pub fn timeseries_id(&self) -> &str {
        &self.metadata.timeseries_id
    }
}
