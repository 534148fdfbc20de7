//! Report Pipeline Benchmarks
//!
//! Measures aggregation fan-out, rendering and serialization over an
//! in-memory gateway.

use chrono::DateTime;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use series_report::aggregation::{AggregatorConfig, SeriesAggregator, SeriesSummary};
use series_report::gateway::InMemoryGateway;
use series_report::report::{DocumentBackend, JsonBackend, ReportRenderer, TextBackend};
use series_report::service::{FixedClock, ReportService, ReportServiceConfig};
use series_report::types::{DataPoint, SeriesKey, TimeWindow};
use std::hint::black_box;
use std::sync::Arc;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Create points for one series
fn create_series_points(seed: usize, count: usize) -> Vec<DataPoint> {
    (0..count)
        .map(|i| {
            DataPoint::new(
                i as i64 * 1000,
                100.0 + (i as f64 * 0.1).sin() * 10.0 + seed as f64,
            )
        })
        .collect()
}

/// Gateway holding `series_count` series of `points_per_series` points
fn create_gateway(series_count: usize, points_per_series: usize) -> Arc<InMemoryGateway> {
    let gateway = Arc::new(InMemoryGateway::new());
    for i in 0..series_count {
        gateway.insert_points(
            &format!("ts:events:metric_{i:05}"),
            &create_series_points(i, points_per_series),
        );
    }
    gateway
}

fn create_summaries(series_count: usize) -> Vec<SeriesSummary> {
    (0..series_count)
        .map(|i| {
            SeriesSummary::from_points(
                SeriesKey::new(format!("ts:events:metric_{i:05}")),
                create_series_points(i, 100),
            )
        })
        .collect()
}

fn window() -> TimeWindow {
    TimeWindow::new(0, i64::MAX)
}

// =============================================================================
// Aggregation Benchmarks
// =============================================================================

fn bench_aggregation_concurrency(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("aggregation_concurrency");

    let series_count = 200;
    let gateway = create_gateway(series_count, 500);
    let keys: Vec<SeriesKey> = (0..series_count)
        .map(|i| SeriesKey::new(format!("ts:events:metric_{i:05}")))
        .collect();
    group.throughput(Throughput::Elements(series_count as u64));

    for limit in [1, 4, 8, 32] {
        let aggregator = SeriesAggregator::new(
            gateway.clone(),
            AggregatorConfig {
                max_concurrent_fetches: limit,
            },
        );

        group.bench_with_input(BenchmarkId::new("max_concurrent", limit), &keys, |b, keys| {
            b.iter(|| rt.block_on(async { black_box(aggregator.compute_all(keys.clone(), window()).await) }));
        });
    }

    group.finish();
}

// =============================================================================
// Rendering Benchmarks
// =============================================================================

fn bench_render_and_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_serialize");
    let renderer = ReportRenderer::default();
    let generated_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap_or_default();
    let backends: [(&str, Arc<dyn DocumentBackend>); 2] = [
        ("text", Arc::new(TextBackend)),
        ("json", Arc::new(JsonBackend)),
    ];

    for series_count in [50, 500, 5000] {
        let summaries = create_summaries(series_count);
        group.throughput(Throughput::Elements(series_count as u64));

        group.bench_with_input(BenchmarkId::new("render", series_count), &summaries, |b, s| {
            b.iter(|| black_box(renderer.render(s, window(), generated_at)));
        });

        let document = renderer.render(&summaries, window(), generated_at);
        for (name, backend) in &backends {
            group.bench_with_input(BenchmarkId::new(*name, series_count), &document, |b, doc| {
                b.iter(|| black_box(backend.serialize(doc).unwrap()));
            });
        }
    }

    group.finish();
}

// =============================================================================
// End-to-End
// =============================================================================

fn bench_generate_report(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("generate_report");

    for series_count in [10, 100, 1000] {
        let service = ReportService::new(create_gateway(series_count, 200), ReportServiceConfig::default())
            .with_clock(Arc::new(FixedClock::from_millis(1_700_000_000_000)));
        group.throughput(Throughput::Elements(series_count as u64));

        group.bench_function(BenchmarkId::new("series", series_count), |b| {
            b.iter(|| rt.block_on(async { black_box(service.generate_report(window()).await.unwrap()) }));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_aggregation_concurrency,
    bench_render_and_serialize,
    bench_generate_report
);
criterion_main!(benches);
