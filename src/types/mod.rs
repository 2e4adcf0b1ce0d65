//! The benchmark result document model.

pub mod document;
pub mod metadata;
pub mod results;
pub mod run;
pub mod summary;
pub mod system;
pub mod timeseries;

/// Free-form string-keyed map of JSON values, used for per-benchmark
/// metrics and configuration whose key sets differ across tools.
///
/// Keeps insertion order: "first numeric metric" means the first one the
/// processor wrote, which is its headline number.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

pub use document::ZathrasDocument;
pub use metadata::{format_timestamp, Metadata, TestInfo, PENDING_ID_SUFFIX};
pub use results::{
    guess_unit, PrimaryMetric, Results, RuntimeInfo, StatisticalSummary, TestConfiguration,
    STATUS_UNKNOWN,
};
pub use run::{Run, TimeSeriesPoint, TimeSeriesSummary};
pub use summary::{SummaryResults, SummaryRun, SummaryView};
pub use system::{
    ConfigurationInfo, CpuInfo, HardwareInfo, MemoryInfo, OperatingSystemInfo, SystemUnderTest,
};
pub use timeseries::{TimeSeriesDocument, TimeSeriesMetadata, TimeSeriesResults, TimeSeriesRun};
