//! End-to-end tests: result directories → documents → stores.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use zathras_post::export::{InMemorySummaryStore, InMemoryTimeseriesStore};
use zathras_post::{
    CreateResult, DocumentExporter, DocumentOutcome, Pipeline, ProcessorRegistry, SummaryStore,
    SummaryView, ZathrasDocument,
};

const CSV: &str = "iteration,threads,IterationsPerSec,Start_Date,End_Date\n\
    1,4,193245.2,2025-11-06T05:09:45Z,2025-11-06T05:10:07Z\n\
    1,4,195999.8,2025-11-06T05:14:45Z,2025-11-06T05:15:07Z\n\
    2,4,190905.9,2025-11-06T05:10:07Z,2025-11-06T05:10:29Z\n\
    2,4,191537.1,2025-11-06T05:15:07Z,2025-11-06T05:15:29Z\n\
    3,4,192112.4,2025-11-06T05:10:29Z,2025-11-06T05:10:51Z\n\
    3,4,190377.0,2025-11-06T05:15:29Z,2025-11-06T05:15:51Z\n";

const SUMMARY: &str = "CoreMark Size    : 666\n\
    Total ticks      : 22449\n\
    Total time (secs): 22.449000\n\
    Iterations/Sec   : 195999.821818\n\
    Iterations       : 4400000\n\
    Compiler version : GCC11.4.1\n";

type MemoryPipeline = Pipeline<InMemorySummaryStore, InMemoryTimeseriesStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn write_coremark(system: &Path, csv: &str) {
    let run_dir = system.join("results_coremark/coremark_2025.11.06-05.09.45");
    fs::create_dir_all(&run_dir).unwrap();
    fs::write(run_dir.join("results_coremark.csv"), csv).unwrap();
    fs::write(run_dir.join("run1_summary"), SUMMARY).unwrap();
    fs::write(run_dir.join("run2_summary"), SUMMARY).unwrap();
    fs::write(run_dir.join("test_results_report"), "Ran\n").unwrap();
    fs::write(run_dir.join("version"), "commit: v1.01\n").unwrap();
}

fn system_dir(root: &Path, instance: &str) -> PathBuf {
    root.join("az_rhel_10_ga/rhel/azure").join(instance)
}

fn stores() -> (Arc<InMemorySummaryStore>, Arc<InMemoryTimeseriesStore>) {
    (Arc::new(InMemorySummaryStore::new()), Arc::new(InMemoryTimeseriesStore::new()))
}

fn exporting_pipeline(
    summary: &Arc<InMemorySummaryStore>,
    timeseries: &Arc<InMemoryTimeseriesStore>,
) -> MemoryPipeline {
    Pipeline::new(ProcessorRegistry::with_defaults())
        .with_exporter(DocumentExporter::new(summary.clone(), timeseries.clone()).with_batch_size(4))
}

// ─────────────────────────────────────────────────────────────────────────────
// Dedup flow
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rerun_is_created_then_duplicate() {
    let tmp = tempfile::tempdir().unwrap();
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_1"), CSV);
    let (summary, timeseries) = stores();

    let first = exporting_pipeline(&summary, &timeseries).run(tmp.path()).await.unwrap();
    assert_eq!(first.successful, 1);
    assert_eq!(first.documents_created, 1);
    assert_eq!(first.documents_duplicate, 0);
    assert_eq!(first.timeseries_indexed, 6);
    assert_eq!(first.exit_code(), 0);

    let second = exporting_pipeline(&summary, &timeseries).run(tmp.path()).await.unwrap();
    assert_eq!(second.successful, 1);
    assert_eq!(second.documents_created, 0);
    assert_eq!(second.documents_duplicate, 1);
    assert_eq!(second.timeseries_indexed, 0);
    assert_eq!(second.timeseries_skipped, 6);

    assert_eq!(summary.len(), 1);
    assert_eq!(timeseries.len(), 6);
}

#[tokio::test]
async fn test_stored_documents_carry_provenance() {
    let tmp = tempfile::tempdir().unwrap();
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_2"), CSV);
    let (summary, timeseries) = stores();
    exporting_pipeline(&summary, &timeseries).run(tmp.path()).await.unwrap();

    let id = summary.ids().remove(0);
    assert!(id.starts_with("coremark_"));
    let stored = summary.get(&id).unwrap();
    assert_eq!(stored["metadata"]["instance_type"], json!("Standard_D8ds_v6"));
    assert_eq!(stored["metadata"]["iteration"], json!(2));
    assert_eq!(stored["metadata"]["test_timestamp"], json!("2025-11-06T05:09:45Z"));
    assert_eq!(stored["results"]["status"], json!("PASS"));
    assert_eq!(stored["results"]["total_runs"], json!(2));
    assert_eq!(stored["results"]["primary_metric"]["name"], json!("iterations_per_second"));
    assert_eq!(stored["results"]["primary_metric"]["value"], json!(195999.821818));
    assert_eq!(stored["results"]["primary_metric"]["unit"], json!("per_second"));
    assert_eq!(stored["results"]["overall_statistics"]["mean"], json!(195999.821818));
    assert_eq!(stored["results"]["overall_statistics"]["sample_count"], json!(2));
    assert!(stored["results"]["runs"]["run_1"].get("timeseries").is_none());

    let samples = timeseries.for_parent(&id);
    assert_eq!(samples.len(), 6);
    assert!(samples.iter().all(|ts| ts.metadata.scenario_name.as_deref() == Some("az_rhel_10_ga")));

    let hits = summary
        .search(&json!({"query": {"term": {"metadata.cloud_provider": "azure"}}}))
        .await
        .unwrap();
    assert_eq!(hits["hits"]["total"]["value"], json!(1));
}

#[tokio::test]
async fn test_distinct_results_get_distinct_ids() {
    let tmp = tempfile::tempdir().unwrap();
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_1"), CSV);
    let other_csv = CSV.replace("193245.2", "193245.3");
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_3"), &other_csv);

    let (summary, timeseries) = stores();
    let stats = exporting_pipeline(&summary, &timeseries).run(tmp.path()).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.documents_created, 2);
    assert_eq!(stats.processed_tests.get("coremark"), Some(&2));
    assert_eq!(summary.len(), 2);
    assert_eq!(timeseries.len(), 12);
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure handling
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failures_do_not_stop_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_1"), CSV);
    write_coremark(
        &system_dir(tmp.path(), "Standard_D8ds_v6_2"),
        "iteration:threads:IterationsPerSec\n1:4:193245.2\n",
    );
    fs::create_dir_all(system_dir(tmp.path(), "Standard_D8ds_v6_3").join("results_uperf")).unwrap();

    let (summary, timeseries) = stores();
    let stats = exporting_pipeline(&summary, &timeseries).run(tmp.path()).await.unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.exit_code(), 1);
    assert!(stats.errors.iter().any(|(test, msg)| test == "coremark" && msg.contains("Start_Date")));
    assert!(stats.errors.iter().any(|(test, msg)| test == "uperf" && msg.starts_with("SKIPPED")));
    assert_eq!(summary.len(), 1);
}

#[derive(Debug, Default)]
struct RejectingStore;

#[async_trait]
impl SummaryStore for RejectingStore {
    type Error = std::io::Error;

    async fn create_document(&self, _: &SummaryView, _: &str) -> Result<CreateResult, Self::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "cluster unavailable"))
    }

    async fn search(&self, _: &Value) -> Result<Value, Self::Error> {
        Ok(json!({"hits": {"hits": []}}))
    }

    async fn delete(&self, _: &str) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_store_failure_is_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_1"), CSV);
    let timeseries = Arc::new(InMemoryTimeseriesStore::new());

    let exporter = DocumentExporter::new(Arc::new(RejectingStore), timeseries.clone());
    let stats = Pipeline::new(ProcessorRegistry::with_defaults())
        .with_exporter(exporter)
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.documents_created, 0);
    assert!(stats.errors[0].1.contains("cluster unavailable"));
    assert!(timeseries.is_empty());
}

#[tokio::test]
async fn test_export_outcome_for_rejecting_store() {
    let tmp = tempfile::tempdir().unwrap();
    let system = system_dir(tmp.path(), "Standard_D8ds_v6_1");
    write_coremark(&system, CSV);
    let documents = zathras_post::DocumentAssembler::new()
        .process(&zathras_post::CoreMarkProcessor::new(), &system)
        .unwrap();

    let exporter = DocumentExporter::new(Arc::new(RejectingStore), Arc::new(InMemoryTimeseriesStore::new()));
    let outcome = exporter.export(&documents[0]).await;
    assert!(matches!(outcome, DocumentOutcome::Failed { ref error } if error.contains("cluster unavailable")));
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_json_output_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    write_coremark(&system_dir(tmp.path(), "Standard_D8ds_v6_1"), CSV);
    let out = tempfile::tempdir().unwrap();

    let stats = MemoryPipeline::new(ProcessorRegistry::with_defaults())
        .with_output_json(out.path())
        .run(tmp.path())
        .await
        .unwrap();
    assert_eq!(stats.successful, 1);
    assert!(!stats.export_enabled);

    let files: Vec<PathBuf> = fs::read_dir(out.path()).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);

    let text = fs::read_to_string(&files[0]).unwrap();
    let document = ZathrasDocument::from_json(&text).unwrap();
    assert_eq!(
        files[0].file_stem().and_then(|s| s.to_str()),
        Some(document.document_id())
    );
    assert_eq!(document.results.runs["run_1"].timeseries.as_ref().map(|t| t.len()), Some(3));
    assert!(zathras_post::verify_content_hash(&document).unwrap());
}

#[tokio::test]
async fn test_missing_input_is_an_error() {
    let result = MemoryPipeline::new(ProcessorRegistry::with_defaults())
        .run(Path::new("/nonexistent/zathras-results"))
        .await;
    assert!(result.is_err());
}
