//! Concurrent per-series aggregation
//!
//! Every key is fetched on its own task, bounded by a semaphore so a large
//! keyspace does not open an unbounded number of in-flight queries:
//!
//! ```text
//! keys (sorted, deduplicated)
//!   ts:a   ts:b   ts:c   ...
//!     │      │      │
//!     └──────┼──────┘
//!     ┌──────▼───────┐
//!     │  Semaphore   │  max_concurrent_fetches permits
//!     └──────┬───────┘
//!            ▼
//!   fetch_range → SeriesSummary      (one failure never cancels the others)
//!            │
//!            ▼
//!   results reassembled by key index → output in key order
//! ```
//!
//! Completion order is irrelevant: each task carries the index of its key
//! and the output vector is rebuilt in sorted key order. Dropping the
//! future returned by [`SeriesAggregator::compute_all`] aborts all
//! outstanding fetches.

use super::summary::SeriesSummary;
use crate::error::GatewayError;
use crate::gateway::TimeSeriesGateway;
use crate::types::{SeriesKey, TimeWindow};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default number of concurrent `fetch_range` calls
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upper bound on in-flight fetches (treated as at least 1)
    pub max_concurrent_fetches: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

/// Computes a [`SeriesSummary`] for every key over one window
pub struct SeriesAggregator {
    gateway: Arc<dyn TimeSeriesGateway>,
    config: AggregatorConfig,
}

impl SeriesAggregator {
    /// Create an aggregator over a gateway
    pub fn new(gateway: Arc<dyn TimeSeriesGateway>, config: AggregatorConfig) -> Self {
        Self { gateway, config }
    }

    /// Summarize every key
    ///
    /// Output has one entry per distinct key, in lexicographic key order.
    /// A failed fetch yields a summary with `fetch_error` set; it never
    /// affects the other keys.
    pub async fn compute_all(&self, mut keys: Vec<SeriesKey>, window: TimeWindow) -> Vec<SeriesSummary> {
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        let limit = self.config.max_concurrent_fetches.max(1);
        debug!(
            series_count = keys.len(),
            max_concurrent = limit,
            window_start = window.start,
            window_end = window.end,
            "Starting series aggregation"
        );

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut join_set = JoinSet::new();

        for (index, key) in keys.iter().cloned().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let permit = Arc::clone(&semaphore);

            join_set.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is dropped
                let _permit = permit.acquire_owned().await.ok();
                let result = gateway.fetch_range(&key, window).await;
                (index, SeriesSummary::from_result(key, result))
            });
        }

        let mut slots: Vec<Option<SeriesSummary>> = (0..keys.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, summary)) => {
                    if let Some(error) = &summary.fetch_error {
                        warn!(key = %summary.key, kind = error.kind(), error = %error, "Series fetch failed");
                    }
                    slots[index] = Some(summary);
                },
                Err(e) => {
                    warn!(error = %e, "Series fetch task panicked");
                },
            }
        }

        // A task that panicked leaves its slot empty
        let summaries: Vec<SeriesSummary> = slots
            .into_iter()
            .zip(keys)
            .map(|(slot, key)| {
                slot.unwrap_or_else(|| {
                    let error = GatewayError::query_failed(key.as_str(), "fetch task aborted");
                    SeriesSummary::failed(key, error)
                })
            })
            .collect();

        debug!(
            series_count = summaries.len(),
            failed = summaries.iter().filter(|s| s.is_failed()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Series aggregation complete"
        );

        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::types::DataPoint;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn window() -> TimeWindow {
        TimeWindow::new(0, 1_000_000)
    }

    fn aggregator(gateway: Arc<dyn TimeSeriesGateway>, limit: usize) -> SeriesAggregator {
        SeriesAggregator::new(
            gateway,
            AggregatorConfig {
                max_concurrent_fetches: limit,
            },
        )
    }

    #[tokio::test]
    async fn test_output_is_in_key_order_regardless_of_latency() {
        let gateway = Arc::new(InMemoryGateway::new());
        for (key, delay) in [("ts:c", 1), ("ts:a", 30), ("ts:b", 10)] {
            gateway.insert_points(key, &[DataPoint::new(1, 1.0)]);
            gateway.set_latency(key, Duration::from_millis(delay));
        }

        let keys = vec!["ts:c".into(), "ts:a".into(), "ts:b".into()];
        let summaries = aggregator(gateway, 8).compute_all(keys, window()).await;

        let order: Vec<&str> = summaries.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(order, vec!["ts:a", "ts:b", "ts:c"]);
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_collapsed() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert_points("ts:a", &[DataPoint::new(1, 1.0)]);

        let keys = vec!["ts:a".into(), "ts:a".into()];
        let summaries = aggregator(gateway.clone(), 4).compute_all(keys, window()).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(gateway.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert_points("ts:a", &[DataPoint::new(1, 2.0)]);
        gateway.insert_points("ts:b", &[DataPoint::new(1, 3.0)]);
        gateway.insert_points("ts:c", &[DataPoint::new(1, 4.0)]);
        gateway.fail_key("ts:b", GatewayError::query_failed("ts:b", "WRONGTYPE"));

        let keys = vec!["ts:a".into(), "ts:b".into(), "ts:c".into()];
        let summaries = aggregator(gateway, 2).compute_all(keys, window()).await;

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].mean, 2.0);
        assert!(summaries[1].is_failed());
        assert_eq!(summaries[2].mean, 4.0);
    }

    #[tokio::test]
    async fn test_empty_key_list() {
        let gateway = Arc::new(InMemoryGateway::new());
        let summaries = aggregator(gateway.clone(), 8).compute_all(Vec::new(), window()).await;
        assert!(summaries.is_empty());
        assert_eq!(gateway.fetch_count(), 0);
    }

    /// Gateway that records the peak number of concurrent fetches
    #[derive(Default)]
    struct ConcurrencyTracker {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TimeSeriesGateway for ConcurrencyTracker {
        fn gateway_id(&self) -> &str {
            "concurrency-tracker"
        }

        async fn list_keys(&self, _prefix: &str) -> Result<Vec<SeriesKey>, GatewayError> {
            Ok(Vec::new())
        }

        async fn fetch_range(
            &self,
            _key: &SeriesKey,
            _window: TimeWindow,
        ) -> Result<Vec<DataPoint>, GatewayError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_is_bounded() {
        let tracker = Arc::new(ConcurrencyTracker::default());
        let keys: Vec<SeriesKey> = (0..40).map(|i| SeriesKey::new(format!("ts:{i:03}"))).collect();

        let summaries = aggregator(tracker.clone(), 3).compute_all(keys, window()).await;

        assert_eq!(summaries.len(), 40);
        let peak = tracker.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency was {peak}");
    }

    /// Gateway whose fetch panics for one key
    struct PanickingGateway;

    #[async_trait]
    impl TimeSeriesGateway for PanickingGateway {
        fn gateway_id(&self) -> &str {
            "panicking"
        }

        async fn list_keys(&self, _prefix: &str) -> Result<Vec<SeriesKey>, GatewayError> {
            Ok(Vec::new())
        }

        async fn fetch_range(
            &self,
            key: &SeriesKey,
            _window: TimeWindow,
        ) -> Result<Vec<DataPoint>, GatewayError> {
            if key.as_str() == "ts:boom" {
                panic!("decoder bug");
            }
            Ok(vec![DataPoint::new(1, 1.0)])
        }
    }

    #[tokio::test]
    async fn test_panicking_fetch_becomes_failed_row() {
        let keys = vec!["ts:boom".into(), "ts:ok".into()];
        let summaries = aggregator(Arc::new(PanickingGateway), 2)
            .compute_all(keys, window())
            .await;

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].key.as_str(), "ts:boom");
        assert!(summaries[0].is_failed());
        assert_eq!(summaries[1].count, 1);
    }
}
