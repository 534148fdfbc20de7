//! Redis integration
//!
//! The report service reads its series from a Redis server running the
//! RedisTimeSeries module.
//!
//! # Schema
//!
//! ```text
//! ts:<namespace>:<name>    → TSDB-TYPE series of (timestamp ms, value)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use series_report::redis::{RedisConfig, RedisPool, RedisTimeSeriesGateway};
//! use series_report::gateway::TimeSeriesGateway;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(RedisPool::new(RedisConfig::default()).await?);
//! let gateway = RedisTimeSeriesGateway::new(pool);
//!
//! let keys = gateway.list_keys("ts:").await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod gateway;
pub mod util;

pub use connection::{PoolMetricsSnapshot, RedisConfig, RedisPool, RetryPolicy};
pub use gateway::RedisTimeSeriesGateway;
