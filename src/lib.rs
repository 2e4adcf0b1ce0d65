//! # zathras-post
//!
//! Normalized benchmark result documents with content-addressed identity.
//!
//! Every benchmark tool Zathras runs (CoreMark, FIO, STREAMS, ...) produces
//! its own output format. This crate turns that output into one
//! [`ZathrasDocument`] schema and exports it to a search index.
//!
//! ## Core Contract
//!
//! 1. A document's identity is a SHA-256 over its canonical summary view,
//!    excluding timestamps and the ID itself
//! 2. The ID is `{test}[_{benchmark}]_{first 16 hex}`; the full hash is kept
//!    in `metadata.content_hash`
//! 3. Summaries are written create-if-absent; a duplicate ID skips the
//!    timeseries export
//!
//! ## Architecture
//!
//! ```text
//! results_<test>/ → BenchmarkProcessor → ZathrasDocument → assign_identity
//!                                              ↓
//!                       summary() ─→ SummaryStore (create-if-absent)
//!                       timeseries_documents() ─→ TimeseriesStore (bulk)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Object keys are sorted at every level before hashing
//! - Floats use the shortest round-trip representation
//! - Re-processing byte-identical results yields the same document ID

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod config;
pub mod export;
pub mod extract;
pub mod identity;
pub mod keys;
pub mod pipeline;
pub mod processor;
pub mod types;
pub mod validation;

// Re-exports
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes, CanonicalError};
pub use config::{ConfigError, OpenSearchConfig, PipelineConfig};
pub use export::{
    BulkExportStats, CreateOutcome, CreateResult, InMemorySummaryStore, InMemoryTimeseriesStore,
    SummaryStore, TimeseriesStore,
};
#[cfg(feature = "opensearch")]
pub use export::{OpenSearchError, OpenSearchExporter};
pub use extract::{
    count_timeseries_points, extract_timeseries_documents, infer_unit, timeseries_documents,
    TimeSeriesDocuments,
};
pub use identity::{
    calculate_content_hash, document_id_for, validate_content_hash, verify_content_hash,
    ContentHash, HashValidation, IdentityError, ID_PREFIX_LEN,
};
pub use keys::{parse_run_key, parse_sequence_key, run_key, sequence_key, KeyFormatError};
pub use pipeline::{
    discover_result_dirs, DocumentExporter, DocumentOutcome, Pipeline, PipelineError,
    ProcessingStats,
};
pub use processor::{
    ArchiveExtractor, BenchmarkProcessor, CoreMarkProcessor, DirectoryExtractor, DocumentAssembler,
    ExtractedResult, ExtractionError, ProcessorError, ProcessorRegistry, RunGroup,
};
pub use types::{
    FieldMap, Metadata, Results, Run, SummaryView, SystemUnderTest, TestConfiguration, TestInfo,
    TimeSeriesDocument, TimeSeriesPoint, TimeSeriesSummary, ZathrasDocument,
};
pub use validation::{validate_json_schema, ValidationReport};

/// Value of `metadata.document_type` on every document.
pub const DOCUMENT_TYPE: &str = "zathras_test_result";

/// Schema version written to `metadata.zathras_version`.
/// Increment on breaking changes to the document schema.
pub const ZATHRAS_VERSION: &str = "1.0";
