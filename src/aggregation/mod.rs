//! Per-series aggregation
//!
//! Turns a set of series keys and one time window into a vector of
//! [`SeriesSummary`] values, one per key, in lexicographic key order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        keys from discovery          │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │   SeriesAggregator (bounded fan-out)│
//! │   fetch_range per key               │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │   SeriesSummary per key             │
//! │   stats + profile, or fetch_error   │
//! └─────────────────────────────────────┘
//! ```

pub mod aggregator;
pub mod profile;
pub mod summary;

pub use aggregator::{AggregatorConfig, SeriesAggregator, DEFAULT_MAX_CONCURRENT_FETCHES};
pub use profile::{BucketWidth, ProfileBucket, SeriesProfile, MAX_PROFILE_BUCKETS};
pub use summary::SeriesSummary;
