//! In-memory gateway
//!
//! A lightweight stand-in for RedisTimeSeries. Samples are held as raw
//! `(timestamp, text)` pairs and decoded through the same seam as store
//! replies, so corrupt samples behave exactly like they would against Redis.
//!
//! Failure injection hooks make it usable for exercising the partial-failure
//! paths of the aggregator:
//!
//! ```rust
//! use series_report::gateway::{InMemoryGateway, TimeSeriesGateway};
//! use series_report::error::GatewayError;
//! use series_report::types::{SeriesKey, TimeWindow};
//!
//! # async fn example() {
//! let gateway = InMemoryGateway::new();
//! gateway.insert_raw("ts:ok", 1000, "1.5");
//! gateway.fail_key("ts:broken", GatewayError::query_failed("ts:broken", "WRONGTYPE"));
//!
//! let points = gateway
//!     .fetch_range(&SeriesKey::from("ts:ok"), TimeWindow::new(0, 2000))
//!     .await
//!     .unwrap();
//! assert_eq!(points.len(), 1);
//! # }
//! ```
//!
//! **Not for production use**: nothing is persisted.

use super::decode::{decode_points, RawSample};
use super::{HealthStatus, TimeSeriesGateway};
use crate::error::GatewayError;
use crate::types::{DataPoint, SeriesKey, TimeWindow};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct MemorySeries {
    samples: Vec<RawSample>,
    failure: Option<GatewayError>,
    latency: Option<Duration>,
}

/// In-process time-series store
///
/// Keys are listed in insertion order, which lets tests control the
/// discovery order the aggregator sees.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    series: RwLock<Vec<(SeriesKey, MemorySeries)>>,
    discovery_failure: RwLock<Option<GatewayError>>,
    fetches: AtomicU64,
}

impl InMemoryGateway {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn with_series<R>(&self, key: &str, f: impl FnOnce(&mut MemorySeries) -> R) -> R {
        let mut series = self.series.write();
        let idx = match series.iter().position(|(k, _)| k.as_str() == key) {
            Some(idx) => idx,
            None => {
                series.push((SeriesKey::from(key), MemorySeries::default()));
                series.len() - 1
            },
        };
        f(&mut series[idx].1)
    }

    /// Register an empty series
    pub fn create_series(&self, key: &str) {
        self.with_series(key, |_| ());
    }

    /// Append typed points to a series
    pub fn insert_points(&self, key: &str, points: &[DataPoint]) {
        self.with_series(key, |series| {
            series.samples.extend(
                points
                    .iter()
                    .map(|p| RawSample::new(p.timestamp, p.value.to_string())),
            );
        });
    }

    /// Append one sample with its value exactly as the store would hold it
    pub fn insert_raw(&self, key: &str, timestamp: i64, value: &str) {
        self.with_series(key, |series| {
            series.samples.push(RawSample::new(timestamp, value));
        });
    }

    /// Append an arbitrary raw sample
    pub fn insert_sample(&self, key: &str, sample: RawSample) {
        self.with_series(key, |series| series.samples.push(sample));
    }

    /// Make every `fetch_range` for `key` fail with `error`
    pub fn fail_key(&self, key: &str, error: GatewayError) {
        self.with_series(key, |series| series.failure = Some(error));
    }

    /// Make `list_keys` fail with `error`
    pub fn fail_discovery(&self, error: GatewayError) {
        *self.discovery_failure.write() = Some(error);
    }

    /// Delay every `fetch_range` for `key`
    pub fn set_latency(&self, key: &str, latency: Duration) {
        self.with_series(key, |series| series.latency = Some(latency));
    }

    /// Number of `fetch_range` calls that reached the store
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TimeSeriesGateway for InMemoryGateway {
    fn gateway_id(&self) -> &str {
        "in-memory-gateway-v1"
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<SeriesKey>, GatewayError> {
        if let Some(err) = self.discovery_failure.read().clone() {
            return Err(err);
        }

        Ok(self
            .series
            .read()
            .iter()
            .filter(|(key, _)| key.has_prefix(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn fetch_range(
        &self,
        key: &SeriesKey,
        window: TimeWindow,
    ) -> Result<Vec<DataPoint>, GatewayError> {
        if window.is_inverted() {
            return Ok(Vec::new());
        }

        // Copy out under the lock; never hold it across the sleep
        let (samples, failure, latency) = {
            let series = self.series.read();
            match series.iter().find(|(k, _)| k == key) {
                Some((_, s)) => (s.samples.clone(), s.failure.clone(), s.latency),
                None => {
                    return Err(GatewayError::query_failed(
                        key.as_str(),
                        "TSDB: the key does not exist",
                    ))
                },
            }
        };

        self.fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = failure {
            return Err(err);
        }

        Ok(decode_points(key, window, samples))
    }

    async fn health_check(&self) -> HealthStatus {
        if self.discovery_failure.read().is_some() {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }
}
