//! Document metadata and test identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DOCUMENT_TYPE, ZATHRAS_VERSION};

/// Suffix of the placeholder ID a document carries until its identity is assigned.
pub const PENDING_ID_SUFFIX: &str = "pending";

/// Format every pipeline-generated timestamp in UTC with millisecond precision.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Identity and provenance of a document.
///
/// `document_id` starts as `{test}_pending` and is overwritten exactly once
/// by [`ZathrasDocument::assign_identity`](crate::ZathrasDocument::assign_identity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// `{test_name}[_{benchmark}]_{16-hex}` once identity is assigned.
    pub document_id: String,
    /// Constant document tag.
    pub document_type: String,
    /// Schema version of the producing pipeline.
    pub zathras_version: String,
    /// When the benchmark actually ran, if the source records it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_timestamp: Option<String>,
    /// When this pipeline produced the document.
    pub processing_timestamp: String,
    /// Deprecated mirror of `test_timestamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_timestamp: Option<String>,
    /// Full 64-hex content hash; the ID only carries a 16-hex prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// OS vendor directory (e.g. `rhel`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_vendor: Option<String>,
    /// Cloud provider directory (e.g. `azure`, `local`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    /// Instance type (e.g. `Standard_D8ds_v6`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Iteration parsed from the instance directory suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    /// Scenario directory (e.g. `az_rhel_10_ga`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
}

impl Metadata {
    /// Create metadata with a placeholder ID, stamped with the current time.
    pub fn new(test_name: &str) -> Self {
        Self::with_processing_time(test_name, Utc::now())
    }

    /// Create metadata with an explicit processing time.
    pub fn with_processing_time(test_name: &str, processed_at: DateTime<Utc>) -> Self {
        Self {
            document_id: format!("{test_name}_{PENDING_ID_SUFFIX}"),
            document_type: DOCUMENT_TYPE.to_string(),
            zathras_version: ZATHRAS_VERSION.to_string(),
            test_timestamp: None,
            processing_timestamp: format_timestamp(processed_at),
            collection_timestamp: None,
            content_hash: None,
            os_vendor: None,
            cloud_provider: None,
            instance_type: None,
            iteration: None,
            scenario_name: None,
        }
    }

    /// Record when the test ran (also fills the deprecated mirror field).
    pub fn with_test_timestamp(mut self, ts: impl Into<String>) -> Self {
        let ts = ts.into();
        self.collection_timestamp = Some(ts.clone());
        self.test_timestamp = Some(ts);
        self
    }

    /// Whether the content-derived identity has been assigned.
    pub fn has_identity(&self) -> bool {
        self.content_hash.is_some()
    }
}

/// Which benchmark produced the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    /// Test name (e.g. `coremark`).
    pub name: String,
    /// Test version.
    pub version: String,
    /// Version of the Zathras wrapper that ran the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_version: Option<String>,
    /// Free-text description of the benchmark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Upstream project URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TestInfo {
    /// Create test info with a name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            wrapper_version: None,
            description: None,
            url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_placeholder_id() {
        let meta = Metadata::new("coremark");
        assert_eq!(meta.document_id, "coremark_pending");
        assert!(!meta.has_identity());
        assert_eq!(meta.document_type, "zathras_test_result");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 6, 5, 9, 45).unwrap();
        assert_eq!(format_timestamp(ts), "2025-11-06T05:09:45.000Z");
    }

    #[test]
    fn test_absent_optionals_not_serialized() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let meta = Metadata::with_processing_time("fio", ts);
        let value = serde_json::to_value(&meta).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("test_timestamp"));
        assert!(!obj.contains_key("content_hash"));
        assert!(obj.contains_key("processing_timestamp"));
    }

    #[test]
    fn test_test_timestamp_mirrors_collection() {
        let meta = Metadata::new("streams").with_test_timestamp("2025-09-18T23:06:19Z");
        assert_eq!(meta.collection_timestamp, meta.test_timestamp);
    }
}
