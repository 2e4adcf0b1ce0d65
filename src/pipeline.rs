//! Processing and export orchestration.
//!
//! [`Pipeline`] walks an input tree for result directories, assembles
//! documents with the registered processors and hands each document to a
//! [`DocumentExporter`]. The exporter writes the summary create-if-absent
//! and only sends timeseries for freshly created summaries: a duplicate ID
//! means identical content, whose timeseries were indexed on first export.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::export::{BulkExportStats, CreateOutcome, SummaryStore, TimeseriesStore};
use crate::extract::count_timeseries_points;
use crate::processor::{DocumentAssembler, ProcessorRegistry};
use crate::types::{TimeSeriesDocument, ZathrasDocument};

/// Default number of timeseries documents per bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

const RESULTS_PREFIX: &str = "results_";

/// Errors that stop a pipeline run before any result is processed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input path does not exist.
    #[error("input path not found: {0}")]
    InputNotFound(PathBuf),

    /// The input path is a file.
    #[error("input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Walking the input tree failed.
    #[error("failed to scan {path}: {source}")]
    Discovery {
        /// Input root.
        path: PathBuf,
        /// Underlying error.
        source: walkdir::Error,
    },
}

/// Final state of one document export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum DocumentOutcome {
    /// Summary written; timeseries exported.
    Created {
        /// Bulk results across all batches.
        timeseries: BulkExportStats,
    },
    /// Summary already present; timeseries not sent.
    Duplicate {
        /// Points that were not exported.
        skipped_points: usize,
    },
    /// The summary write failed.
    Failed {
        /// Store error message.
        error: String,
    },
}

/// Exports documents to a summary store and a timeseries store.
pub struct DocumentExporter<S, T> {
    summary: Arc<S>,
    timeseries: Arc<T>,
    batch_size: usize,
}

impl<S: SummaryStore, T: TimeseriesStore> DocumentExporter<S, T> {
    /// Create an exporter with the default batch size.
    pub fn new(summary: Arc<S>, timeseries: Arc<T>) -> Self {
        Self {
            summary,
            timeseries,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the timeseries batch size (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The summary store.
    pub fn summary_store(&self) -> &S {
        &self.summary
    }

    /// The timeseries store.
    pub fn timeseries_store(&self) -> &T {
        &self.timeseries
    }

    /// Export one document.
    ///
    /// Never returns an error: failures are reported as
    /// [`DocumentOutcome::Failed`] so the caller can continue with the next
    /// document.
    pub async fn export(&self, document: &ZathrasDocument) -> DocumentOutcome {
        let id = document.document_id();
        let summary = document.summary();

        let created = match self.summary.create_document(&summary, id).await {
            Ok(result) => result,
            Err(err) => {
                error!(document_id = %id, error = %err, "Summary export failed");
                return DocumentOutcome::Failed { error: err.to_string() };
            }
        };

        match created.result {
            CreateOutcome::Duplicate => {
                let skipped_points = count_timeseries_points(document);
                warn!(document_id = %id, skipped_points, "Duplicate detected, skipped");
                DocumentOutcome::Duplicate { skipped_points }
            }
            CreateOutcome::Created => {
                let timeseries = self.export_timeseries(document).await;
                info!(
                    document_id = %id,
                    points = timeseries.successful,
                    failed = timeseries.failed,
                    "Created summary document"
                );
                DocumentOutcome::Created { timeseries }
            }
        }
    }

    async fn export_timeseries(&self, document: &ZathrasDocument) -> BulkExportStats {
        let mut stats = BulkExportStats::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        for item in document.timeseries_documents() {
            match item {
                Ok(ts) => batch.push(ts),
                Err(err) => {
                    stats.total += 1;
                    stats.record_failure(err.to_string());
                    continue;
                }
            }
            if batch.len() >= self.batch_size {
                self.send_batch(&mut batch, &mut stats).await;
            }
        }
        if !batch.is_empty() {
            self.send_batch(&mut batch, &mut stats).await;
        }
        stats
    }

    async fn send_batch(&self, batch: &mut Vec<TimeSeriesDocument>, stats: &mut BulkExportStats) {
        debug!(size = batch.len(), "Sending timeseries batch");
        match self.timeseries.bulk_export(batch).await {
            Ok(result) => stats.merge(result),
            Err(err) => {
                error!(size = batch.len(), error = %err, "Timeseries batch failed");
                let mut failed = BulkExportStats {
                    total: batch.len(),
                    failed: batch.len(),
                    ..Default::default()
                };
                failed.errors.push(err.to_string());
                stats.merge(failed);
            }
        }
        batch.clear();
    }
}

/// Counts accumulated over a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Result entries seen.
    pub total: usize,
    /// Results processed (and exported, if enabled) without error.
    pub successful: usize,
    /// Results that failed.
    pub failed: usize,
    /// Results with no registered processor.
    pub skipped: usize,
    /// Successful results per test name.
    pub processed_tests: BTreeMap<String, usize>,
    /// Summary documents newly written.
    pub documents_created: usize,
    /// Summary documents rejected as duplicates.
    pub documents_duplicate: usize,
    /// Timeseries documents indexed.
    pub timeseries_indexed: usize,
    /// Timeseries documents not sent because their summary was a duplicate.
    pub timeseries_skipped: usize,
    /// `(test, message)` for every failure and skip.
    pub errors: Vec<(String, String)>,
    /// Whether a store exporter was configured.
    pub export_enabled: bool,
    /// Wall-clock duration of the run.
    pub duration_seconds: f64,
}

impl ProcessingStats {
    /// Record a processed result.
    pub fn record_success(&mut self, test: &str) {
        self.successful += 1;
        *self.processed_tests.entry(test.to_string()).or_default() += 1;
    }

    /// Record a failed result.
    pub fn record_failure(&mut self, test: &str, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push((test.to_string(), error.into()));
    }

    /// Record a skipped result.
    pub fn record_skip(&mut self, test: &str, reason: &str) {
        self.skipped += 1;
        self.errors.push((test.to_string(), format!("SKIPPED: {reason}")));
    }

    /// Fold a document export outcome into the counters.
    pub fn record_outcome(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Created { timeseries } => {
                self.documents_created += 1;
                self.timeseries_indexed += timeseries.successful;
            }
            DocumentOutcome::Duplicate { skipped_points } => {
                self.documents_duplicate += 1;
                self.timeseries_skipped += skipped_points;
            }
            DocumentOutcome::Failed { .. } => {}
        }
    }

    /// Process exit status: non-zero if anything failed or nothing succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 || self.successful == 0 {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for ProcessingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(70);
        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "PROCESSING SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total: {}", self.total)?;
        writeln!(f, "Successful: {}", self.successful)?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        writeln!(f, "Duration: {:.2} seconds", self.duration_seconds)?;
        writeln!(f)?;

        if self.export_enabled {
            writeln!(f, "Summary Documents:")?;
            writeln!(f, "  Total: {}", self.documents_created + self.documents_duplicate)?;
            writeln!(f, "  Indexed: {}", self.documents_created)?;
            writeln!(f, "  Duplicates (skipped): {}", self.documents_duplicate)?;
            writeln!(f)?;
            writeln!(f, "Time Series Documents:")?;
            writeln!(f, "  Total: {}", self.timeseries_indexed + self.timeseries_skipped)?;
            writeln!(f, "  Indexed: {}", self.timeseries_indexed)?;
            writeln!(f, "  Duplicates (skipped): {}", self.timeseries_skipped)?;
            writeln!(f)?;
        }

        if !self.processed_tests.is_empty() {
            writeln!(f, "Tests Processed:")?;
            for (test, count) in &self.processed_tests {
                writeln!(f, "  - {test}: {count}")?;
            }
            writeln!(f)?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "Errors ({}):", self.errors.len())?;
            for (test, message) in &self.errors {
                writeln!(f, "  - {test}: {message}")?;
            }
            writeln!(f)?;
        }

        write!(f, "{rule}")
    }
}

/// Directories under `input` that hold `results_*` entries, sorted.
///
/// If `input` itself holds results, only `input` is returned.
pub fn discover_result_dirs(input: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !input.exists() {
        return Err(PipelineError::InputNotFound(input.to_path_buf()));
    }
    if !input.is_dir() {
        return Err(PipelineError::NotADirectory(input.to_path_buf()));
    }

    if !result_tests(input).is_empty() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut dirs = BTreeSet::new();
    let walker = WalkDir::new(input)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !entry.path().parent().is_some_and(is_results_entry));
    for entry in walker {
        let entry = entry.map_err(|source| PipelineError::Discovery {
            path: input.to_path_buf(),
            source,
        })?;
        if is_results_entry(entry.path()) {
            if let Some(parent) = entry.path().parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }

    let dirs: Vec<PathBuf> = dirs.into_iter().collect();
    info!(count = dirs.len(), input = %input.display(), "Discovered result directories");
    Ok(dirs)
}

fn is_results_entry(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(RESULTS_PREFIX))
}

/// Test names of the `results_<test>` directories and `results_<test>.zip`
/// archives directly inside `dir`.
fn result_tests(dir: &Path) -> BTreeSet<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return BTreeSet::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            let test = name.strip_prefix(RESULTS_PREFIX)?;
            let test = test.strip_suffix(".zip").unwrap_or(test);
            (!test.is_empty() && !test.contains('.')).then(|| test.to_string())
        })
        .collect()
}

/// End-to-end processing of a result tree.
pub struct Pipeline<S, T> {
    registry: ProcessorRegistry,
    assembler: DocumentAssembler,
    exporter: Option<DocumentExporter<S, T>>,
    output_json: Option<PathBuf>,
}

impl<S: SummaryStore, T: TimeseriesStore> Pipeline<S, T> {
    /// A pipeline that only processes (no export, no JSON output).
    pub fn new(registry: ProcessorRegistry) -> Self {
        Self {
            registry,
            assembler: DocumentAssembler::new(),
            exporter: None,
            output_json: None,
        }
    }

    /// Use a custom document assembler.
    pub fn with_assembler(mut self, assembler: DocumentAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Export every document through `exporter`.
    pub fn with_exporter(mut self, exporter: DocumentExporter<S, T>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Write each full document to `{dir}/{document_id}.json`.
    pub fn with_output_json(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_json = Some(dir.into());
        self
    }

    /// Process every result directory under `input`.
    pub async fn run(&self, input: &Path) -> Result<ProcessingStats, PipelineError> {
        let started = Instant::now();
        let mut stats = ProcessingStats {
            export_enabled: self.exporter.is_some(),
            ..Default::default()
        };

        let dirs = discover_result_dirs(input)?;
        if dirs.is_empty() {
            warn!(input = %input.display(), "No result directories found");
        }
        for dir in &dirs {
            self.process_result_dir(dir, &mut stats).await;
        }

        stats.duration_seconds = started.elapsed().as_secs_f64();
        Ok(stats)
    }

    /// Process every `results_<test>` entry of one directory.
    pub async fn process_result_dir(&self, dir: &Path, stats: &mut ProcessingStats) {
        let tests = result_tests(dir);
        info!(dir = %dir.display(), results = tests.len(), "Processing result directory");

        for test in tests {
            stats.total += 1;
            let Some(processor) = self.registry.get(&test) else {
                warn!(test = %test, "Unknown test type");
                stats.record_skip(&test, "Unknown test type");
                continue;
            };

            let documents = match self.assembler.process(processor.as_ref(), dir) {
                Ok(documents) => documents,
                Err(err) => {
                    error!(test = %test, dir = %dir.display(), error = %err, "Failed to process results");
                    stats.record_failure(&test, err.to_string());
                    continue;
                }
            };

            match self.handle_documents(&documents, stats).await {
                Ok(()) => stats.record_success(&test),
                Err(message) => stats.record_failure(&test, message),
            }
        }
    }

    async fn handle_documents(
        &self,
        documents: &[ZathrasDocument],
        stats: &mut ProcessingStats,
    ) -> Result<(), String> {
        if let Some(dir) = &self.output_json {
            for document in documents {
                write_json(dir, document)?;
            }
        }

        let Some(exporter) = &self.exporter else {
            return Ok(());
        };

        let mut first_error = None;
        for document in documents {
            let outcome = exporter.export(document).await;
            stats.record_outcome(&outcome);
            if let DocumentOutcome::Failed { error } = outcome {
                if first_error.is_none() {
                    first_error = Some(format!("export of {} failed: {error}", document.document_id()));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn write_json(dir: &Path, document: &ZathrasDocument) -> Result<(), String> {
    let path = dir.join(format!("{}.json", document.document_id()));
    let json = document.to_json_pretty().map_err(|e| e.to_string())?;
    std::fs::create_dir_all(dir)
        .and_then(|()| std::fs::write(&path, json))
        .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    debug!(path = %path.display(), "Wrote document JSON");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{InMemorySummaryStore, InMemoryTimeseriesStore};
    use crate::types::fixtures::sample_document;

    fn exporter() -> DocumentExporter<InMemorySummaryStore, InMemoryTimeseriesStore> {
        DocumentExporter::new(
            Arc::new(InMemorySummaryStore::new()),
            Arc::new(InMemoryTimeseriesStore::new()),
        )
    }

    fn identified() -> ZathrasDocument {
        let mut doc = sample_document();
        doc.assign_identity(None).unwrap();
        doc
    }

    #[tokio::test]
    async fn test_created_then_duplicate() {
        let exporter = exporter();
        let doc = identified();

        let first = exporter.export(&doc).await;
        let DocumentOutcome::Created { timeseries } = first else {
            panic!("expected created");
        };
        assert_eq!(timeseries.total, 4);
        assert_eq!(timeseries.successful, 4);
        assert_eq!(exporter.timeseries_store().len(), 4);

        let second = exporter.export(&doc).await;
        assert_eq!(second, DocumentOutcome::Duplicate { skipped_points: 4 });
        assert_eq!(exporter.summary_store().len(), 1);
        assert_eq!(exporter.timeseries_store().len(), 4);
    }

    #[tokio::test]
    async fn test_batches_cover_every_point() {
        let exporter = exporter().with_batch_size(3);
        let outcome = exporter.export(&identified()).await;
        let DocumentOutcome::Created { timeseries } = outcome else {
            panic!("expected created");
        };
        assert_eq!(timeseries.successful, 4);
        assert_eq!(exporter.timeseries_store().len(), 4);
    }

    #[tokio::test]
    async fn test_summary_has_no_timeseries() {
        let exporter = exporter();
        let doc = identified();
        exporter.export(&doc).await;

        let stored = exporter.summary_store().get(doc.document_id()).unwrap();
        for run in stored["results"]["runs"].as_object().unwrap().values() {
            assert!(run.get("timeseries").is_none());
            assert!(run.get("timeseries_summary").is_some());
        }
    }

    #[test]
    fn test_stats_outcomes_and_exit_code() {
        let mut stats = ProcessingStats::default();
        assert_eq!(stats.exit_code(), 1);

        stats.record_outcome(&DocumentOutcome::Created {
            timeseries: BulkExportStats { total: 4, successful: 4, ..Default::default() },
        });
        stats.record_outcome(&DocumentOutcome::Duplicate { skipped_points: 4 });
        stats.record_success("coremark");
        assert_eq!(stats.documents_created, 1);
        assert_eq!(stats.documents_duplicate, 1);
        assert_eq!(stats.timeseries_indexed, 4);
        assert_eq!(stats.timeseries_skipped, 4);
        assert_eq!(stats.exit_code(), 0);

        stats.record_skip("uperf", "Unknown test type");
        assert_eq!(stats.exit_code(), 0);
        stats.record_failure("fio", "boom");
        assert_eq!(stats.exit_code(), 1);

        let text = stats.to_string();
        assert!(text.contains("PROCESSING SUMMARY"));
        assert!(text.contains("  - coremark: 1"));
        assert!(text.contains("uperf: SKIPPED: Unknown test type"));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(DocumentOutcome::Duplicate { skipped_points: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"result": "duplicate", "skipped_points": 2}));
    }

    #[test]
    fn test_discover_result_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("scenario/rhel/azure/Standard_D8ds_v6_1");
        let b = tmp.path().join("scenario/rhel/aws/m5.xlarge_0");
        std::fs::create_dir_all(a.join("results_coremark/coremark_2025.11.06-05.09.45")).unwrap();
        std::fs::write(
            a.join("results_coremark/coremark_2025.11.06-05.09.45/results_coremark.csv"),
            "",
        )
        .unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join("results_streams.zip"), b"PK").unwrap();
        std::fs::create_dir_all(tmp.path().join("scenario/empty")).unwrap();

        let dirs = discover_result_dirs(tmp.path()).unwrap();
        assert_eq!(dirs, vec![b.clone(), a.clone()]);
        assert_eq!(discover_result_dirs(&a).unwrap(), vec![a.clone()]);
        assert_eq!(
            result_tests(&a).into_iter().collect::<Vec<_>>(),
            vec!["coremark".to_string()]
        );
    }

    #[test]
    fn test_discover_missing_input() {
        assert!(matches!(
            discover_result_dirs(Path::new("/nonexistent/zathras")),
            Err(PipelineError::InputNotFound(_))
        ));
    }
}
