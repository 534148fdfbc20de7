//! Report Generation Integration Tests
//!
//! Drives [`ReportService`] end to end over the in-memory gateway.
//!
//! # Test Coverage
//!
//! 1. **Ordering** - rows follow lexicographic key order
//! 2. **Partial Failure** - one failing series yields one error row
//! 3. **Pagination** - 120 series split 50/50/20
//! 4. **Idempotence** - fixed clock and unchanged data give identical bytes
//! 5. **Total Unavailability** - discovery failure yields no document
//! 6. **Malformed Samples** - corrupt samples are dropped, not fatal
//! 7. **Cancellation** - in-flight generation stops on token
//! 8. **Row Identity** - every text row names its full series key
//! 9. **Filtering** - a metric list narrows the report

use async_trait::async_trait;
use series_report::{
    error::{GatewayError, ReportError},
    gateway::{InMemoryGateway, RawSample, TimeSeriesGateway},
    report::{JsonBackend, ReportFormat},
    service::{FixedClock, ReportService, ReportServiceConfig, SeriesFilter},
    types::{DataPoint, SeriesKey, TimeWindow},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const GENERATED_AT_MS: i64 = 1_700_000_000_000;

fn window() -> TimeWindow {
    TimeWindow::new(0, 1_000_000)
}

fn service(gateway: Arc<InMemoryGateway>) -> ReportService {
    ReportService::new(gateway, ReportServiceConfig::default())
        .with_clock(Arc::new(FixedClock::from_millis(GENERATED_AT_MS)))
}

fn json_rows(bytes: &[u8]) -> Vec<serde_json::Value> {
    let doc: serde_json::Value = serde_json::from_slice(bytes).unwrap();
    doc["pages"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|p| p["rows"].as_array().unwrap().clone())
        .collect()
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_rows_in_lexicographic_order() {
    let gateway = Arc::new(InMemoryGateway::new());
    // Insertion order is the discovery order of the in-memory store
    for (key, delay_ms) in [("ts:zeta", 0), ("ts:alpha", 20), ("ts:mid", 5)] {
        gateway.insert_points(key, &[DataPoint::new(10, 1.0)]);
        gateway.set_latency(key, Duration::from_millis(delay_ms));
    }

    let report = service(gateway)
        .with_backend(Arc::new(JsonBackend))
        .generate_report(window())
        .await
        .unwrap();

    let keys: Vec<String> = json_rows(&report.bytes)
        .iter()
        .map(|r| r["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["ts:alpha", "ts:mid", "ts:zeta"]);
}

#[tokio::test]
async fn test_keys_outside_prefix_are_ignored() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_points("ts:a", &[DataPoint::new(10, 1.0)]);
    gateway.insert_points("session:abc", &[DataPoint::new(10, 1.0)]);

    let report = service(gateway).generate_report(window()).await.unwrap();
    assert_eq!(report.totals.series, 1);
}

// =============================================================================
// Partial Failure
// =============================================================================

#[tokio::test]
async fn test_one_failing_series_gives_one_error_row() {
    let gateway = Arc::new(InMemoryGateway::new());
    for key in ["ts:a", "ts:b", "ts:c", "ts:d"] {
        gateway.insert_points(key, &[DataPoint::new(10, 2.0), DataPoint::new(20, 4.0)]);
    }
    gateway.fail_key("ts:c", GatewayError::query_failed("ts:c", "WRONGTYPE"));

    let report = service(gateway)
        .with_backend(Arc::new(JsonBackend))
        .generate_report(window())
        .await
        .unwrap();

    let rows = json_rows(&report.bytes);
    assert_eq!(rows.len(), 4);
    let failed: Vec<&serde_json::Value> = rows.iter().filter(|r| r["status"] == "failed").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["key"], "ts:c");
    assert_eq!(failed[0]["kind"], "QueryFailed");

    assert_eq!(report.totals.failed, 1);
    assert_eq!(report.totals.data_points, 6);
}

#[tokio::test]
async fn test_empty_series_distinct_from_failed_series() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.create_series("ts:events:empty");
    gateway.insert_points("ts:events:failed", &[DataPoint::new(10, 1.0)]);
    gateway.fail_key(
        "ts:events:failed",
        GatewayError::StoreUnavailable("connection reset".into()),
    );

    let report = service(gateway).generate_report(window()).await.unwrap();
    let text = String::from_utf8(report.bytes.to_vec()).unwrap();

    let empty_line = text.lines().find(|l| l.starts_with("Empty")).unwrap();
    let failed_line = text.lines().find(|l| l.starts_with("Failed")).unwrap();
    assert!(empty_line.contains("0.00"));
    assert!(!empty_line.contains("ERROR"));
    assert!(failed_line.contains("ERROR [StoreUnavailable]"));
}

#[tokio::test]
async fn test_every_series_failing_still_produces_report() {
    let gateway = Arc::new(InMemoryGateway::new());
    for key in ["ts:a", "ts:b"] {
        gateway.create_series(key);
        gateway.fail_key(key, GatewayError::StoreUnavailable("timeout".into()));
    }

    let report = service(gateway).generate_report(window()).await.unwrap();
    assert_eq!(report.totals.series, 2);
    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.page_count, 1);
}

// =============================================================================
// Row Identity
// =============================================================================

#[tokio::test]
async fn test_text_rows_disambiguate_colliding_names() {
    let keys = [
        "ts:events:page_view",
        "ts:events:Page_view",
        "ts:events:a_very_long_metric_name_number_one",
        "ts:events:a_very_long_metric_name_number_two",
    ];
    let gateway = Arc::new(InMemoryGateway::new());
    for key in keys {
        gateway.insert_points(key, &[DataPoint::new(10, 1.0)]);
    }

    let report = service(gateway).generate_report(window()).await.unwrap();
    let text = String::from_utf8(report.bytes.to_vec()).unwrap();

    // Both pairs render the same display name
    let names: Vec<String> = keys
        .iter()
        .map(|k| SeriesKey::from(*k).display_name("ts:"))
        .collect();
    assert_eq!(names[0], names[1]);
    assert_eq!(names[2][..31], names[3][..31]);

    for key in keys {
        let rows = text.lines().filter(|l| l.ends_with(&format!("  {key}"))).count();
        assert_eq!(rows, 1, "no row for {key}");
    }
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_metric_filter_narrows_report() {
    let gateway = Arc::new(InMemoryGateway::new());
    for key in ["ts:events:page_view", "ts:events:signup", "ts:events:checkout"] {
        gateway.insert_points(key, &[DataPoint::new(10, 1.0)]);
    }

    let report = service(gateway.clone())
        .with_backend(Arc::new(JsonBackend))
        .generate_filtered_report(window(), &SeriesFilter::metrics(["events:signup", "events:gone"]))
        .await
        .unwrap();

    let keys: Vec<String> = json_rows(&report.bytes)
        .iter()
        .map(|r| r["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["ts:events:signup"]);
    assert_eq!(gateway.fetch_count(), 1);
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn test_pagination_fifty_fifty_twenty() {
    let gateway = Arc::new(InMemoryGateway::new());
    for i in 0..120 {
        gateway.insert_points(&format!("ts:s{i:03}"), &[DataPoint::new(10, i as f64)]);
    }

    let report = service(gateway)
        .with_backend(Arc::new(JsonBackend))
        .generate_report(window())
        .await
        .unwrap();
    assert_eq!(report.page_count, 3);

    let doc: serde_json::Value = serde_json::from_slice(&report.bytes).unwrap();
    let sizes: Vec<usize> = doc["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["rows"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert_eq!(doc["pages"][1]["rows"][0]["key"], "ts:s050");
}

#[tokio::test]
async fn test_no_series_renders_one_page() {
    let report = service(Arc::new(InMemoryGateway::new()))
        .generate_report(window())
        .await
        .unwrap();
    assert_eq!(report.page_count, 1);
    assert_eq!(report.totals.series, 0);
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_same_inputs_give_identical_bytes() {
    let gateway = Arc::new(InMemoryGateway::new());
    for i in 0..75 {
        gateway.insert_points(
            &format!("ts:events:metric_{i}"),
            &[DataPoint::new(10, i as f64 * 0.5), DataPoint::new(20, 3.25)],
        );
    }
    gateway.fail_key("ts:events:metric_7", GatewayError::query_failed("ts:events:metric_7", "ERR"));

    for format in [ReportFormat::Text, ReportFormat::Json] {
        let svc = service(gateway.clone()).with_backend(format.backend());
        let first = svc.generate_report(window()).await.unwrap();
        let second = svc.generate_report(window()).await.unwrap();
        assert_eq!(first.bytes, second.bytes, "{format} output differs");
        assert_eq!(first.file_name(), second.file_name());
    }
}

// =============================================================================
// Total Unavailability
// =============================================================================

#[tokio::test]
async fn test_discovery_failure_yields_generation_failed() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_points("ts:a", &[DataPoint::new(10, 1.0)]);
    gateway.fail_discovery(GatewayError::StoreUnavailable("connection refused".into()));

    let err = service(gateway.clone())
        .generate_report(window())
        .await
        .unwrap_err();

    match err {
        ReportError::GenerationFailed(cause) => assert_eq!(cause.kind(), "StoreUnavailable"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(gateway.fetch_count(), 0);
}

// =============================================================================
// Window Handling & Decode
// =============================================================================

#[tokio::test]
async fn test_inverted_window_returns_empty_points() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_points("ts:a", &[DataPoint::new(10, 1.0)]);

    let points = service(gateway)
        .get_time_series_data(&"ts:a".into(), TimeWindow::new(100, 0))
        .await
        .unwrap();
    assert!(points.is_empty());
}

#[tokio::test]
async fn test_malformed_samples_are_dropped() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_raw("ts:a", 10, "1.5");
    gateway.insert_raw("ts:a", 20, "not-a-number");
    gateway.insert_raw("ts:a", 30, "NaN");
    gateway.insert_sample("ts:a", RawSample::malformed());
    gateway.insert_raw("ts:a", 40, "2.5");

    let points = service(gateway)
        .get_time_series_data(&"ts:a".into(), window())
        .await
        .unwrap();
    assert_eq!(points, vec![DataPoint::new(10, 1.5), DataPoint::new(40, 2.5)]);
}

#[tokio::test]
async fn test_points_are_sorted_and_windowed() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_points(
        "ts:a",
        &[
            DataPoint::new(30, 3.0),
            DataPoint::new(10, 1.0),
            DataPoint::new(5_000_000, 9.0),
            DataPoint::new(20, 2.0),
        ],
    );

    let points = gateway.fetch_range(&"ts:a".into(), window()).await.unwrap();
    let timestamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
    assert_eq!(timestamps, vec![10, 20, 30]);
}

// =============================================================================
// Cancellation
// =============================================================================

/// Gateway whose fetches sleep, then record that they ran to completion
struct CountingSlowGateway {
    started: AtomicUsize,
    completed: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl TimeSeriesGateway for CountingSlowGateway {
    fn gateway_id(&self) -> &str {
        "counting-slow"
    }

    async fn list_keys(&self, _prefix: &str) -> Result<Vec<SeriesKey>, GatewayError> {
        Ok((0..4).map(|i| SeriesKey::new(format!("ts:slow{i}"))).collect())
    }

    async fn fetch_range(
        &self,
        _key: &SeriesKey,
        _window: TimeWindow,
    ) -> Result<Vec<DataPoint>, GatewayError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(vec![DataPoint::new(10, 1.0)])
    }
}

#[tokio::test]
async fn test_cancellation_stops_generation() {
    let gateway = Arc::new(CountingSlowGateway {
        started: AtomicUsize::new(0),
        completed: AtomicUsize::new(0),
        delay: Duration::from_millis(200),
    });

    let svc = ReportService::new(gateway.clone(), ReportServiceConfig::default())
        .with_clock(Arc::new(FixedClock::from_millis(GENERATED_AT_MS)));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        svc.generate_report_cancellable(window(), &SeriesFilter::default(), &token),
    )
    .await
    .expect("cancellation did not stop generation");
    assert!(matches!(result, Err(ReportError::Cancelled)));
    assert_eq!(gateway.started.load(Ordering::SeqCst), 4);

    // Outlive the fetch delay: aborted fetches must never finish
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(gateway.completed.load(Ordering::SeqCst), 0);
}
