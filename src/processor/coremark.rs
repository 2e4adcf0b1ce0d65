//! CoreMark processor.
//!
//! Reads `results_coremark.csv` (one row per iteration measurement, with
//! `Start_Date`/`End_Date` columns) and the per-run `run<N>_summary` files.
//! Older CSVs without timestamp columns are rejected.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::extract::{ExtractedResult, RESULTS_CSV, RUN_SUMMARIES, TUNED_SETTING, VERSION};
use super::parse::{parse_key_values, parse_version, read_file};
use super::{BenchmarkProcessor, ProcessorError};
use crate::keys::{run_key, sequence_key};
use crate::types::{FieldMap, Run, TimeSeriesPoint, TimeSeriesSummary};

/// Test name handled by [`CoreMarkProcessor`].
pub const TEST_NAME: &str = "coremark";

const START_COLUMN: &str = "Start_Date";

#[derive(Debug, Clone, Deserialize)]
struct CsvRow {
    iteration: u32,
    #[serde(default)]
    threads: Option<u32>,
    #[serde(rename = "IterationsPerSec")]
    iterations_per_sec: f64,
    #[serde(rename = "Start_Date", default)]
    start_date: Option<String>,
    #[serde(rename = "End_Date", default)]
    end_date: Option<String>,
}

/// Processor for CoreMark results.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreMarkProcessor;

impl CoreMarkProcessor {
    /// Create the processor.
    pub fn new() -> Self {
        Self
    }
}

impl BenchmarkProcessor for CoreMarkProcessor {
    fn test_name(&self) -> &str {
        TEST_NAME
    }

    fn parse_runs(&self, extracted: &ExtractedResult) -> Result<BTreeMap<String, Run>, ProcessorError> {
        let csv_path = extracted
            .file(RESULTS_CSV)
            .ok_or_else(|| ProcessorError::MissingFile {
                test: TEST_NAME.to_string(),
                file: format!("results_{TEST_NAME}.csv"),
            })?;
        let groups = group_by_run(read_rows(csv_path)?);

        let version = extracted
            .file(VERSION)
            .map(read_file)
            .transpose()?
            .map(|text| parse_version(&text));
        let tuned_setting = extracted
            .file(TUNED_SETTING)
            .map(read_file)
            .transpose()?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let summaries = extracted.file_list(RUN_SUMMARIES);
        let run_count = groups.len().max(summaries.len());
        let mut runs = BTreeMap::new();

        for index in 0..run_count {
            let run_number = index as u64 + 1;
            let summary = match summaries.get(index) {
                Some(path) => parse_key_values(&read_file(path)?),
                None => FieldMap::new(),
            };
            let rows = groups.get(index).map(Vec::as_slice).unwrap_or(&[]);

            let mut run = build_run(run_number, &summary, rows);
            if let Some(version) = &version {
                run.configuration.insert("version".into(), json!(version));
            }
            if let Some(tuned) = &tuned_setting {
                run.configuration.insert("tuned_setting".into(), json!(tuned));
            }
            runs.insert(run_key(run_number), run);
        }

        info!(runs = runs.len(), "Parsed CoreMark runs");
        Ok(runs)
    }
}

fn read_rows(path: &Path) -> Result<Vec<CsvRow>, ProcessorError> {
    let text = read_file(path)?;
    let header = text.lines().next().unwrap_or_default();
    let delimiter = if header.contains(',') { b',' } else { b':' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let has_start = reader
        .headers()
        .map_err(|source| ProcessorError::Csv { path: path.to_path_buf(), source })?
        .iter()
        .any(|h| h == START_COLUMN);
    if !has_start {
        return Err(ProcessorError::MissingTimestamps {
            path: path.to_path_buf(),
            reason: format!("no {START_COLUMN} column; timestamp-less CSV format is not supported"),
        });
    }

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row = record.map_err(|source| ProcessorError::Csv { path: path.to_path_buf(), source })?;
        let start = row.start_date.as_deref().unwrap_or_default();
        if DateTime::parse_from_rfc3339(start).is_err() {
            return Err(ProcessorError::MissingTimestamps {
                path: path.to_path_buf(),
                reason: format!("row {}: invalid {START_COLUMN} '{start}'", line + 2),
            });
        }
        rows.push(row);
    }
    debug!(rows = rows.len(), path = %path.display(), "Read CoreMark CSV");
    Ok(rows)
}

/// Rows sharing an iteration number belong to consecutive runs:
/// the first row for iteration `i` goes to run 1, the second to run 2.
fn group_by_run(rows: Vec<CsvRow>) -> Vec<Vec<CsvRow>> {
    let mut by_iteration: BTreeMap<u32, Vec<CsvRow>> = BTreeMap::new();
    for row in rows {
        by_iteration.entry(row.iteration).or_default().push(row);
    }

    let mut runs: Vec<Vec<CsvRow>> = Vec::new();
    for measurements in by_iteration.into_values() {
        for (index, row) in measurements.into_iter().enumerate() {
            if runs.len() <= index {
                runs.push(Vec::new());
            }
            runs[index].push(row);
        }
    }
    runs
}

fn build_run(run_number: u64, summary: &FieldMap, rows: &[CsvRow]) -> Run {
    let mut run = Run::new(run_number, "PASS");

    let copy = |target: &mut FieldMap, from: &str, to: &str| {
        if let Some(value) = summary.get(from) {
            target.insert(to.to_string(), value.clone());
        }
    };
    copy(&mut run.metrics, "iterations_per_sec", "iterations_per_second");
    copy(&mut run.metrics, "iterations", "total_iterations");
    copy(&mut run.metrics, "total_time_secs", "total_time_seconds");
    if !run.metrics.contains_key("total_time_seconds") {
        copy(&mut run.metrics, "total_time", "total_time_seconds");
    }
    copy(&mut run.metrics, "total_ticks", "total_ticks");
    copy(&mut run.metrics, "coremark_size", "coremark_size");

    copy(&mut run.configuration, "compiler_version", "compiler");
    copy(&mut run.configuration, "compiler_flags", "compiler_flags");
    copy(&mut run.configuration, "parallel_pthreads", "threads");
    if !run.configuration.contains_key("threads") {
        if let Some(threads) = rows.first().and_then(|r| r.threads) {
            run.configuration.insert("threads".into(), json!(threads));
        }
    }

    run.duration_seconds = run.metrics.get("total_time_seconds").and_then(Value::as_f64);
    run.validation = crc_validation(summary);

    if !rows.is_empty() {
        let values: Vec<f64> = rows.iter().map(|r| r.iterations_per_sec).collect();
        let points = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let point = TimeSeriesPoint::new(row.start_date.clone().unwrap_or_default())
                    .with_metric("iterations_per_second", row.iterations_per_sec);
                (sequence_key(i as u64), point)
            })
            .collect();

        run.start_time = rows.first().and_then(|r| r.start_date.clone());
        run.end_time = rows.last().and_then(|r| r.end_date.clone()).filter(|s| !s.is_empty());
        run.timeseries_summary = TimeSeriesSummary::from_values(&values);
        run.timeseries = Some(points);
    }
    run
}

/// Collect `seedcrc` and per-thread `<n>_crc*` values into one object.
fn crc_validation(summary: &FieldMap) -> Option<FieldMap> {
    let mut threads: BTreeMap<u32, FieldMap> = BTreeMap::new();
    let mut seedcrc = None;

    for (key, value) in summary {
        if key == "seedcrc" {
            seedcrc = Some(value.clone());
            continue;
        }
        let Some((thread, crc_type)) = key.split_once('_') else {
            continue;
        };
        if !crc_type.starts_with("crc") {
            continue;
        }
        if let Ok(thread) = thread.parse::<u32>() {
            threads
                .entry(thread)
                .or_insert_with(|| [("thread".to_string(), json!(thread))].into_iter().collect())
                .insert(crc_type.to_string(), value.clone());
        }
    }

    if threads.is_empty() && seedcrc.is_none() {
        return None;
    }

    let mut validation = FieldMap::new();
    validation.insert("status".into(), json!("PASS"));
    validation.insert(
        "threads".into(),
        Value::Array(threads.into_values().map(Value::Object).collect()),
    );
    if let Some(seedcrc) = seedcrc {
        validation.insert("seedcrc".into(), seedcrc);
    }
    Some(validation)
}
