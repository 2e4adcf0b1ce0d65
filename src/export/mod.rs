//! Exporter backends.
//!
//! Two stores receive documents: the summary store (one row per test result,
//! written create-if-absent) and the timeseries store (bulk samples).

pub mod memory;

#[cfg(feature = "opensearch")]
pub mod opensearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{SummaryView, TimeSeriesDocument};

/// At most this many per-item errors are kept in [`BulkExportStats`].
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Result of a create-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateOutcome {
    /// Fresh write.
    Created,
    /// A document with this ID already existed; nothing was written.
    Duplicate,
}

/// What the summary store reported for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    /// Document ID the write targeted.
    pub id: String,
    /// `created` or `duplicate`.
    pub result: CreateOutcome,
}

impl CreateResult {
    /// A fresh write.
    pub fn created(id: impl Into<String>) -> Self {
        Self { id: id.into(), result: CreateOutcome::Created }
    }

    /// A rejected duplicate.
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self { id: id.into(), result: CreateOutcome::Duplicate }
    }
}

/// Counts from one bulk export call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkExportStats {
    /// Documents submitted.
    pub total: usize,
    /// Documents the store accepted.
    pub successful: usize,
    /// Documents the store rejected.
    pub failed: usize,
    /// First [`MAX_REPORTED_ERRORS`] rejection messages.
    pub errors: Vec<String>,
}

impl BulkExportStats {
    /// Record a rejected item, keeping at most [`MAX_REPORTED_ERRORS`] messages.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(error.into());
        }
    }

    /// Fold another batch into this one.
    pub fn merge(&mut self, other: BulkExportStats) {
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
        let room = MAX_REPORTED_ERRORS.saturating_sub(self.errors.len());
        self.errors.extend(other.errors.into_iter().take(room));
    }
}

/// Store for summary documents.
///
/// `create_document` must never overwrite: an existing ID yields
/// [`CreateOutcome::Duplicate`], which is not an error.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write the document under `id` unless that ID already exists.
    async fn create_document(&self, document: &SummaryView, id: &str) -> Result<CreateResult, Self::Error>;

    /// Run a search query and return the raw response.
    async fn search(&self, query: &Value) -> Result<Value, Self::Error>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, Self::Error>;
}

/// Store for denormalized timeseries documents.
#[async_trait]
pub trait TimeseriesStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Index documents keyed by their `timeseries_id`.
    async fn bulk_export(&self, documents: &[TimeSeriesDocument]) -> Result<BulkExportStats, Self::Error>;

    /// Remove every sample belonging to a parent document. Returns the count removed.
    async fn delete_by_parent(&self, document_id: &str) -> Result<u64, Self::Error>;
}

pub use memory::{InMemoryExportError, InMemorySummaryStore, InMemoryTimeseriesStore};

#[cfg(feature = "opensearch")]
pub use opensearch::{OpenSearchError, OpenSearchExporter};
