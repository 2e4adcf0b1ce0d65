//! The root aggregate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metadata::{Metadata, TestInfo};
use super::results::{Results, RuntimeInfo, TestConfiguration};
use super::summary::{SummaryResults, SummaryView};
use super::system::SystemUnderTest;
use super::timeseries::TimeSeriesDocument;
use crate::extract::{self, TimeSeriesDocuments};
use crate::identity::{self, ContentHash, IdentityError};
use crate::keys::KeyFormatError;
use crate::validation::{self, ValidationReport};

/// One normalized benchmark result.
///
/// The document owns its whole tree. After construction the only permitted
/// mutation is [`assign_identity`](Self::assign_identity), which runs once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZathrasDocument {
    /// Identity and provenance.
    pub metadata: Metadata,
    /// Which benchmark ran.
    pub test: TestInfo,
    /// Hardware, OS and tuning of the machine.
    #[serde(default)]
    pub system_under_test: SystemUnderTest,
    /// How the benchmark was configured.
    #[serde(default)]
    pub test_configuration: TestConfiguration,
    /// Status, statistics and runs.
    pub results: Results,
    /// Harness invocation details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_info: Option<RuntimeInfo>,
}

impl ZathrasDocument {
    /// Assemble a document.
    pub fn new(
        metadata: Metadata,
        test: TestInfo,
        system_under_test: SystemUnderTest,
        test_configuration: TestConfiguration,
        results: Results,
    ) -> Self {
        Self {
            metadata,
            test,
            system_under_test,
            test_configuration,
            results,
            runtime_info: None,
        }
    }

    /// Attach runtime info.
    pub fn with_runtime_info(mut self, runtime_info: RuntimeInfo) -> Self {
        self.runtime_info = Some(runtime_info);
        self
    }

    /// Current document ID (a placeholder until identity is assigned).
    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }

    /// Compact JSON of the full document, timeseries included.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty-printed JSON of the full document.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a document from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deep copy of the document with `timeseries` removed from every run.
    pub fn summary(&self) -> SummaryView {
        SummaryView {
            metadata: self.metadata.clone(),
            test: self.test.clone(),
            system_under_test: self.system_under_test.clone(),
            test_configuration: self.test_configuration.clone(),
            results: SummaryResults::from(&self.results),
            runtime_info: self.runtime_info.clone(),
        }
    }

    /// Content hash of the summary view. Does not modify the document.
    pub fn calculate_content_hash(&self) -> Result<ContentHash, IdentityError> {
        identity::calculate_content_hash(self)
    }

    /// Compute the content hash and overwrite the placeholder ID with
    /// `{test}[_{benchmark}]_{prefix}`, embedding the full hash.
    ///
    /// Fails with [`IdentityError::AlreadyAssigned`] on a second call.
    pub fn assign_identity(&mut self, benchmark: Option<&str>) -> Result<ContentHash, IdentityError> {
        if self.metadata.has_identity() {
            return Err(IdentityError::AlreadyAssigned {
                document_id: self.metadata.document_id.clone(),
            });
        }
        if self.test.name.is_empty() {
            return Err(IdentityError::EmptyTestName);
        }

        let hash = self.calculate_content_hash()?;
        self.metadata.document_id = identity::document_id_for(&self.test.name, benchmark, &hash);
        self.metadata.content_hash = Some(hash.to_string());

        debug!(
            document_id = %self.metadata.document_id,
            content_hash = %hash,
            "Assigned document identity"
        );
        Ok(hash)
    }

    /// Lazily denormalize every timeseries point into its own document.
    pub fn timeseries_documents(&self) -> TimeSeriesDocuments<'_> {
        extract::timeseries_documents(self)
    }

    /// Collect every timeseries point as a standalone document.
    pub fn extract_timeseries_documents(&self) -> Result<Vec<TimeSeriesDocument>, KeyFormatError> {
        extract::extract_timeseries_documents(self)
    }

    /// Structural checks; never fails, reports every violation.
    pub fn validate(&self) -> ValidationReport {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_document;

    #[test]
    fn test_summary_drops_timeseries_keeps_summary() {
        let doc = sample_document();
        assert!(doc.results.runs.values().any(|r| r.timeseries.is_some()));

        let value = serde_json::to_value(doc.summary()).unwrap();
        for run in value["results"]["runs"].as_object().unwrap().values() {
            assert!(run.get("timeseries").is_none());
            assert!(run.get("timeseries_summary").is_some());
        }
    }

    #[test]
    fn test_summary_does_not_mutate_document() {
        let doc = sample_document();
        let before = doc.clone();
        let _ = doc.summary();
        let _ = doc.calculate_content_hash().unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_assign_identity_once() {
        let mut doc = sample_document();
        assert_eq!(doc.document_id(), "coremark_pending");

        let hash = doc.assign_identity(None).unwrap();
        assert_eq!(doc.document_id(), format!("coremark_{}", hash.prefix()));
        assert_eq!(doc.metadata.content_hash.as_deref(), Some(hash.as_str()));

        let err = doc.assign_identity(None).unwrap_err();
        assert!(matches!(err, IdentityError::AlreadyAssigned { .. }));
    }

    #[test]
    fn test_assign_identity_with_benchmark() {
        let mut doc = sample_document();
        let hash = doc.assign_identity(Some("500.perlbench_r")).unwrap();
        assert_eq!(
            doc.document_id(),
            format!("coremark_500.perlbench_r_{}", hash.prefix())
        );
    }

    #[test]
    fn test_empty_test_name_rejected() {
        let mut doc = sample_document();
        doc.test.name.clear();
        assert!(matches!(
            doc.assign_identity(None),
            Err(IdentityError::EmptyTestName)
        ));
    }

    #[test]
    fn test_json_roundtrip_is_byte_identical() {
        let mut doc = sample_document();
        doc.assign_identity(None).unwrap();
        let json = doc.to_json().unwrap();
        let back = ZathrasDocument::from_json(&json).unwrap();
        assert_eq!(back.to_json().unwrap(), json);
        assert_eq!(back, doc);
    }

    #[test]
    fn test_top_level_keys() {
        let value = serde_json::to_value(sample_document()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        for key in ["metadata", "test", "system_under_test", "test_configuration", "results"] {
            assert!(keys.iter().any(|k| k == key), "missing {key}");
        }
    }
}
