//! Performance benchmarks for content hashing and timeseries extraction.
//!
//! Run with: `cargo bench --bench hashing`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Content hash | <1ms for 10 runs | Summary view excludes points |
//! | Extraction | Linear in points | One document per point |

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use zathras_post::{
    run_key, sequence_key, Metadata, Results, Run, SystemUnderTest, TestConfiguration, TestInfo,
    TimeSeriesPoint, TimeSeriesSummary, ZathrasDocument,
};

/// A CoreMark-shaped document with `runs` runs of `points` samples each.
fn make_document(runs: u64, points: u64) -> ZathrasDocument {
    let runs = (1..=runs)
        .map(|n| {
            let mut run = Run::new(n, "PASS");
            run.metrics.insert("iterations_per_second".into(), json!(190_000.0 + n as f64));
            run.metrics.insert("total_time_seconds".into(), json!(22.449));
            run.configuration.insert("threads".into(), json!(8));

            let values: Vec<f64> = (0..points).map(|i| 190_000.0 + (i % 97) as f64 * 13.7).collect();
            let series = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let point = TimeSeriesPoint::new(format!("2025-11-06T05:{:02}:{:02}Z", i / 60 % 60, i % 60))
                        .with_metric("iterations_per_second", *v);
                    (sequence_key(i as u64), point)
                })
                .collect();
            run.timeseries_summary = TimeSeriesSummary::from_values(&values);
            run.timeseries = Some(series);
            (run_key(n), run)
        })
        .collect::<BTreeMap<_, _>>();

    ZathrasDocument::new(
        Metadata::new("coremark"),
        TestInfo::new("coremark", "v1.01"),
        SystemUnderTest::default(),
        TestConfiguration::default(),
        Results::new("PASS").with_runs(runs),
    )
}

/// Benchmark the content hash over documents of growing run count.
fn bench_content_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_hash");

    for runs in [1u64, 10, 100] {
        let document = make_document(runs, 50);
        group.throughput(Throughput::Elements(runs));
        group.bench_with_input(BenchmarkId::from_parameter(runs), &document, |b, doc| {
            b.iter(|| black_box(doc.calculate_content_hash().unwrap()))
        });
    }

    group.finish();
}

/// Benchmark collecting every timeseries point into standalone documents.
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeseries_extraction");

    for points in [10u64, 100, 1000] {
        let mut document = make_document(5, points);
        document.assign_identity(None).unwrap();
        group.throughput(Throughput::Elements(points * 5));
        group.bench_with_input(BenchmarkId::from_parameter(points), &document, |b, doc| {
            b.iter(|| black_box(doc.extract_timeseries_documents().unwrap()))
        });
    }

    group.finish();
}

/// Benchmark the summary projection alone.
fn bench_summary(c: &mut Criterion) {
    let document = make_document(10, 500);
    c.bench_function("summary_view", |b| b.iter(|| black_box(document.summary())));
}

criterion_group!(benches, bench_content_hash, bench_extraction, bench_summary);
criterion_main!(benches);
