//! Timeseries extraction: one standalone document per sample.
//!
//! Walks every `(run, sequence, point)` of a document, picks a single scalar
//! value per point and a best-effort unit per run, and copies the parent's
//! test info and SUT into each output document.

use std::collections::btree_map;

use serde_json::Value;
use tracing::debug;

use crate::keys::{parse_sequence_key, KeyFormatError};
use crate::types::{
    FieldMap, Run, TimeSeriesDocument, TimeSeriesMetadata, TimeSeriesPoint, TimeSeriesResults,
    TimeSeriesRun, ZathrasDocument,
};

/// Point metric names preferred as the scalar value, in priority order.
pub const VALUE_KEYS: [&str; 3] = ["value_seconds", "throughput_bops", "value"];

/// Unit reported when no run metric name gives a cue.
pub const UNKNOWN_UNIT: &str = "unknown";

/// Infer a unit from a run's metric names.
///
/// Rules apply in priority order across all keys: `seconds`/`_sec`, then
/// `bops`, then `mb_per_sec`/`bandwidth`. This is a heuristic; a run mixing
/// unrelated metric families can get the wrong unit.
pub fn infer_unit(run_metrics: &FieldMap) -> &'static str {
    fn any_key(metrics: &FieldMap, cues: &[&str]) -> bool {
        metrics
            .keys()
            .any(|name| cues.iter().any(|cue| name.contains(cue)))
    }

    if any_key(run_metrics, &["seconds", "_sec"]) {
        "seconds"
    } else if any_key(run_metrics, &["bops"]) {
        "bops"
    } else if any_key(run_metrics, &["mb_per_sec", "bandwidth"]) {
        "MB/s"
    } else {
        UNKNOWN_UNIT
    }
}

/// Pick the scalar value of a point and return it with the remaining metrics.
///
/// Prefers [`VALUE_KEYS`] in order, then the first numeric metric in the
/// order the producer wrote them. A preferred key holding a non-number is treated as a plain metric.
/// Returns `None` when the point has no numeric metric at all.
pub fn resolve_point_value(metrics: &FieldMap) -> Option<(f64, FieldMap)> {
    let (chosen, value) = VALUE_KEYS
        .iter()
        .find_map(|key| {
            metrics
                .get_key_value(*key)
                .and_then(|(k, v)| v.as_f64().map(|v| (k, v)))
        })
        .or_else(|| {
            metrics
                .iter()
                .find_map(|(k, v)| v.as_f64().map(|v| (k, v)))
        })?;

    let rest = metrics
        .iter()
        .filter(|(k, _)| *k != chosen)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some((value, rest))
}

/// Total number of timeseries points in a document, resolvable or not.
pub fn count_timeseries_points(document: &ZathrasDocument) -> usize {
    document.results.runs.values().map(Run::point_count).sum()
}

/// Lazy iterator over a document's timeseries documents.
///
/// Yields `Err` for a malformed sequence key and keeps going afterwards.
pub fn timeseries_documents(document: &ZathrasDocument) -> TimeSeriesDocuments<'_> {
    TimeSeriesDocuments {
        document,
        runs: document.results.runs.iter(),
        current: None,
    }
}

/// Collect every timeseries document, failing on the first malformed key.
pub fn extract_timeseries_documents(
    document: &ZathrasDocument,
) -> Result<Vec<TimeSeriesDocument>, KeyFormatError> {
    let docs = timeseries_documents(document).collect::<Result<Vec<_>, _>>()?;
    debug!(
        document_id = %document.metadata.document_id,
        extracted = docs.len(),
        total_points = count_timeseries_points(document),
        "Extracted timeseries documents"
    );
    Ok(docs)
}

struct RunCursor<'a> {
    run_key: &'a str,
    run: &'a Run,
    unit: &'static str,
    points: btree_map::Iter<'a, String, TimeSeriesPoint>,
}

/// Iterator returned by [`timeseries_documents`].
pub struct TimeSeriesDocuments<'a> {
    document: &'a ZathrasDocument,
    runs: btree_map::Iter<'a, String, Run>,
    current: Option<RunCursor<'a>>,
}

impl<'a> TimeSeriesDocuments<'a> {
    fn build(
        &self,
        cursor: &RunCursor<'a>,
        sequence_key: &str,
        point: &TimeSeriesPoint,
    ) -> Result<Option<TimeSeriesDocument>, KeyFormatError> {
        let sequence = parse_sequence_key(sequence_key)?;
        let Some((value, point_metrics)) = resolve_point_value(&point.metrics) else {
            debug!(
                run = cursor.run_key,
                sequence = sequence_key,
                "Skipping timeseries point without a numeric metric"
            );
            return Ok(None);
        };

        let parent = &self.document.metadata;
        let run = cursor.run;
        let metadata = TimeSeriesMetadata {
            document_id: parent.document_id.clone(),
            timeseries_id: format!("{}_{}_{}", parent.document_id, cursor.run_key, sequence_key),
            timestamp: point.timestamp.clone(),
            sequence,
            test_timestamp: parent.test_timestamp.clone(),
            processing_timestamp: Some(parent.processing_timestamp.clone()),
            os_vendor: parent.os_vendor.clone(),
            cloud_provider: parent.cloud_provider.clone(),
            instance_type: parent.instance_type.clone(),
            scenario_name: parent.scenario_name.clone(),
            iteration: parent.iteration,
        };

        let results = TimeSeriesResults {
            run: TimeSeriesRun {
                run_key: cursor.run_key.to_string(),
                run_number: run.run_number,
                status: run.status.clone(),
                configuration: (!run.configuration.is_empty()).then(|| run.configuration.clone()),
                benchmark_name: string_metric(run, "benchmark_name"),
                benchmark_description: string_metric(run, "description"),
            },
            value,
            unit: cursor.unit.to_string(),
            point_metrics,
        };

        Ok(Some(TimeSeriesDocument {
            metadata,
            test: self.document.test.clone(),
            system_under_test: self.document.system_under_test.clone(),
            results,
        }))
    }
}

impl<'a> Iterator for TimeSeriesDocuments<'a> {
    type Item = Result<TimeSeriesDocument, KeyFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(cursor) = self.current.as_mut() else {
                let (run_key, run) = self.runs.next()?;
                if let Some(points) = run.timeseries.as_ref() {
                    self.current = Some(RunCursor {
                        run_key,
                        run,
                        unit: infer_unit(&run.metrics),
                        points: points.iter(),
                    });
                }
                continue;
            };

            let Some((sequence_key, point)) = cursor.points.next() else {
                self.current = None;
                continue;
            };

            let cursor = self.current.as_ref()?;
            match self.build(cursor, sequence_key, point) {
                Ok(Some(doc)) => return Some(Ok(doc)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn string_metric(run: &Run, key: &str) -> Option<String> {
    run.metrics.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{run_key, sequence_key};
    use crate::types::fixtures::sample_document;
    use serde_json::json;

    fn metrics(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_prefers_named_keys() {
        let (v, rest) = resolve_point_value(&metrics(json!({
            "a": 1.0, "value": 3.0, "throughput_bops": 2.0
        })))
        .unwrap();
        assert_eq!(v, 2.0);
        assert_eq!(rest, metrics(json!({"a": 1.0, "value": 3.0})));

        let (v, _) = resolve_point_value(&metrics(json!({"value": 3.0, "value_seconds": 0.5}))).unwrap();
        assert_eq!(v, 0.5);
    }

    #[test]
    fn test_resolve_falls_back_to_first_numeric() {
        let (v, rest) = resolve_point_value(&metrics(json!({
            "label": "x", "latency_us": 12, "value": "n/a"
        })))
        .unwrap();
        assert_eq!(v, 12.0);
        assert_eq!(rest, metrics(json!({"label": "x", "value": "n/a"})));
    }

    #[test]
    fn test_resolve_fallback_follows_insertion_order() {
        let fio = metrics(json!({
            "total_bandwidth_kbps": 1000.0,
            "total_iops": 250.0,
            "avg_latency_ns": 5.0,
            "avg_clat_ns": 4.0,
            "avg_slat_ns": 1.0
        }));
        let (v, rest) = resolve_point_value(&fio).unwrap();
        assert_eq!(v, 1000.0);

        let remaining: Vec<&str> = rest.keys().map(String::as_str).collect();
        assert_eq!(remaining, ["total_iops", "avg_latency_ns", "avg_clat_ns", "avg_slat_ns"]);
    }

    #[test]
    fn test_resolve_no_numeric() {
        assert!(resolve_point_value(&metrics(json!({"label": "x", "ok": true}))).is_none());
        assert!(resolve_point_value(&FieldMap::new()).is_none());
    }

    #[test]
    fn test_infer_unit_priority() {
        assert_eq!(infer_unit(&metrics(json!({"max_jops": 1, "total_time_seconds": 2}))), "seconds");
        assert_eq!(infer_unit(&metrics(json!({"bandwidth": 1, "throughput_bops": 2}))), "bops");
        assert_eq!(infer_unit(&metrics(json!({"copy_mb_per_sec": 1}))), "seconds");
        assert_eq!(infer_unit(&metrics(json!({"read_bandwidth": 1}))), "MB/s");
        assert_eq!(infer_unit(&metrics(json!({"score": 1}))), "unknown");
        assert_eq!(infer_unit(&FieldMap::new()), "unknown");
    }

    #[test]
    fn test_extract_sample_document() {
        let mut doc = sample_document();
        doc.assign_identity(None).unwrap();
        let docs = doc.extract_timeseries_documents().unwrap();

        assert_eq!(docs.len(), 4);
        assert_eq!(count_timeseries_points(&doc), 4);

        let first = &docs[0];
        assert_eq!(
            first.metadata.timeseries_id,
            format!("{}_run_1_sequence_0", doc.document_id())
        );
        assert_eq!(first.metadata.sequence, 0);
        assert_eq!(first.metadata.os_vendor.as_deref(), Some("rhel"));
        assert_eq!(first.results.unit, "seconds");
        assert_eq!(first.results.run.run_key, "run_1");
        assert!(first.results.point_metrics.is_empty());
        assert_eq!(first.test, doc.test);
        assert_eq!(first.system_under_test, doc.system_under_test);
    }

    #[test]
    fn test_skips_points_without_numeric_value() {
        let mut doc = sample_document();
        let run = doc.results.runs.get_mut(&run_key(1)).unwrap();
        let points = run.timeseries.as_mut().unwrap();
        points.insert(
            sequence_key(7),
            TimeSeriesPoint::new("2025-11-06T05:10:00Z").with_metric("note", "warmup"),
        );

        let docs = doc.extract_timeseries_documents().unwrap();
        assert_eq!(count_timeseries_points(&doc), 5);
        assert_eq!(docs.len(), 4);
    }

    #[test]
    fn test_malformed_sequence_key_is_error() {
        let mut doc = sample_document();
        let run = doc.results.runs.get_mut(&run_key(2)).unwrap();
        run.timeseries
            .as_mut()
            .unwrap()
            .insert("seq_9".to_string(), TimeSeriesPoint::new("t").with_metric("v", 1.0));

        let err = doc.extract_timeseries_documents().unwrap_err();
        assert_eq!(err.key, "seq_9");

        // The lazy form reports the error in place and continues.
        let items: Vec<_> = doc.timeseries_documents().collect();
        assert_eq!(items.len(), 5);
        assert_eq!(items.iter().filter(|i| i.is_err()).count(), 1);
    }

    #[test]
    fn test_benchmark_name_copied_from_run_metrics() {
        let mut doc = sample_document();
        let run = doc.results.runs.get_mut(&run_key(1)).unwrap();
        run.metrics.insert("benchmark_name".into(), json!("nbody"));
        run.metrics.insert("description".into(), json!("N-body simulation"));

        let docs = doc.extract_timeseries_documents().unwrap();
        assert_eq!(docs[0].results.run.benchmark_name.as_deref(), Some("nbody"));
        assert_eq!(
            docs[0].results.run.benchmark_description.as_deref(),
            Some("N-body simulation")
        );
        assert_eq!(docs[2].results.run.benchmark_name, None);
    }

    #[test]
    fn test_runs_without_timeseries_yield_nothing() {
        let mut doc = sample_document();
        for run in doc.results.runs.values_mut() {
            run.timeseries = None;
        }
        assert!(doc.extract_timeseries_documents().unwrap().is_empty());
    }
}
