//! Request and response types for the HTTP API

use crate::gateway::HealthStatus;
use crate::redis::PoolMetricsSnapshot;
use crate::types::DataPoint;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Report API Types
// =============================================================================

/// `POST /api/v1/reports/generate` body
///
/// Missing bounds default to the trailing window configured on the service.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportRequest {
    /// Window start, milliseconds since epoch
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    /// Window end, milliseconds since epoch
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    /// Restrict the report to these metrics (empty = all)
    #[serde(default)]
    pub metrics: Vec<String>,
}

/// `POST /api/v1/reports/generate` response
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportResponse {
    /// Serialized document
    pub pdf_data: Vec<u8>,
    /// Pages in the document
    pub page_count: usize,
    /// Generation time, RFC 3339
    pub generated_at: String,
}

/// Query string of `GET /api/v1/reports/download` and `GET /api/v1/timeseries/all`
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    /// Window start, milliseconds since epoch
    #[serde(default)]
    pub start: Option<i64>,
    /// Window end, milliseconds since epoch
    #[serde(default)]
    pub end: Option<i64>,
    /// Comma-separated metric names (absent = all)
    #[serde(default)]
    pub metrics: Option<String>,
}

impl WindowParams {
    /// Non-blank metric names from the `metrics` parameter
    pub fn metric_list(&self) -> Vec<String> {
        self.metrics
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Time Series API Types
// =============================================================================

/// `POST /api/v1/timeseries` body
#[derive(Debug, Deserialize)]
pub struct TimeSeriesRequest {
    /// Full series key, e.g. `ts:events:signup`
    pub key: String,
    /// Window start, milliseconds since epoch
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    /// Window end, milliseconds since epoch
    #[serde(default)]
    pub end_timestamp: Option<i64>,
}

/// `POST /api/v1/timeseries` response
#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesResponse {
    /// Requested key
    pub key: String,
    /// Points in the window, ascending by timestamp
    pub data_points: Vec<DataPoint>,
}

/// One point of `GET /api/v1/timeseries/all`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedPoint {
    /// Milliseconds since epoch
    pub timestamp: i64,
    /// Sample value
    pub value: f64,
    /// `timestamp` as RFC 3339 with milliseconds, UTC
    pub date: String,
}

impl From<DataPoint> for DatedPoint {
    fn from(point: DataPoint) -> Self {
        let date = DateTime::from_timestamp_millis(point.timestamp)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        Self {
            timestamp: point.timestamp,
            value: point.value,
            date,
        }
    }
}

/// `GET /api/v1/timeseries/all` response
///
/// `data` maps every selected key to its points. A key whose fetch failed
/// maps to an empty list and its error is listed in `errors`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllSeriesResponse {
    /// Always `true`
    pub success: bool,
    /// Points per key, keys in lexicographic order
    pub data: BTreeMap<String, Vec<DatedPoint>>,
    /// Fetch error per failed key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

// =============================================================================
// Admin Types
// =============================================================================

/// `GET /health` response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, `degraded` or `unhealthy`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Backing store health as seen by the gateway
    pub store: HealthStatus,
}

/// `GET /api/v1/stats` response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Gateway implementation id
    pub gateway: String,
    /// Reports returned successfully
    pub reports_generated: u64,
    /// Reports that failed
    pub reports_failed: u64,
    /// Single-series queries served
    pub series_queries: u64,
    /// Present when the service runs over a Redis pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolMetricsSnapshot>,
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Error message
    pub error: String,
}
