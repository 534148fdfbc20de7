//! Store gateway abstraction
//!
//! A [`TimeSeriesGateway`] is the only component that talks to the backing
//! store. It hands the rest of the service strongly-typed [`DataPoint`]
//! sequences; untyped store replies are converted in [`decode`] and nowhere
//! else.
//!
//! # Implementations
//!
//! - [`crate::redis::RedisTimeSeriesGateway`] - RedisTimeSeries over a pooled connection
//! - [`InMemoryGateway`] - in-process store for tests and offline runs

pub mod decode;
pub mod memory;

pub use decode::{RawField, RawSample};
pub use memory::InMemoryGateway;

use crate::error::GatewayError;
use crate::types::{DataPoint, SeriesKey, TimeWindow};
use async_trait::async_trait;
use serde::Serialize;

/// Typed client over an external time-series store
///
/// Implementations must be safe for concurrent use: the aggregator issues
/// many `fetch_range` calls in parallel against one shared instance.
#[async_trait]
pub trait TimeSeriesGateway: Send + Sync + 'static {
    /// Unique identifier for this gateway implementation
    fn gateway_id(&self) -> &str;

    /// Enumerate every series whose key starts with `prefix`
    ///
    /// No ordering is promised; callers sort.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<SeriesKey>, GatewayError>;

    /// Fetch all points of `key` with timestamp in `[window.start, window.end]`
    ///
    /// The result is ascending by timestamp. An inverted window returns an
    /// empty sequence without touching the store.
    async fn fetch_range(
        &self,
        key: &SeriesKey,
        window: TimeWindow,
    ) -> Result<Vec<DataPoint>, GatewayError>;

    /// Check store reachability
    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Unknown
    }
}

/// Health status of the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store is answering
    Healthy,
    /// Store is answering slowly
    Degraded,
    /// Store is not answering
    Unhealthy,
    /// Not yet checked, or the gateway cannot tell
    Unknown,
}
