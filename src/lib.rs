//! Series Report - reporting service over a RedisTimeSeries store
//!
//! This library turns a namespace of time series into a paginated summary
//! report:
//! - Key discovery and range queries behind a pluggable store gateway
//! - Bounded concurrent per-series aggregation with failure isolation
//! - Backend-neutral paginated document model (text and JSON output)
//! - HTTP binding with report download and raw series queries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Store gateway trait, typed decode seam and in-memory implementation
pub mod gateway;

/// Redis integration: pooled connection and RedisTimeSeries gateway
pub mod redis;

/// Concurrent per-series summary statistics
pub mod aggregation;

/// Document model, pagination and serialization backends
pub mod report;

/// Report service boundary (GetTimeSeriesData, GenerateReport)
pub mod service;

/// axum router and handlers
pub mod http;

// Re-export main types
pub use error::{Error, GatewayError, RenderError, ReportError, Result};
pub use gateway::{InMemoryGateway, TimeSeriesGateway};
pub use service::{GeneratedReport, ReportService, ReportServiceConfig};
pub use types::{DataPoint, SeriesKey, TimeWindow};
