//! Core data types shared by the gateway, aggregator and renderer
//!
//! # Key Types
//!
//! - **`SeriesKey`**: Store identifier of one time-series (e.g. `ts:events:page_view`)
//! - **`DataPoint`**: A single sample (timestamp + value)
//! - **`TimeWindow`**: Inclusive `[start, end]` millisecond range a query is scoped to
//!
//! # Example
//!
//! ```rust
//! use series_report::types::{DataPoint, SeriesKey, TimeWindow};
//!
//! let key = SeriesKey::from("ts:events:page_view");
//! let point = DataPoint::new(1_700_000_000_000, 42.0);
//!
//! let window = TimeWindow::new(1_700_000_000_000, 1_700_000_060_000);
//! assert!(window.contains(point.timestamp));
//! assert_eq!(key.display_name("ts:"), "Page View");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds in one day
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Identifier of a single time-series in the store
///
/// Keys are opaque strings namespaced by a prefix marker. Ordering is plain
/// lexicographic ordering of the underlying string, which is the ordering
/// reports use for their rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Create a key from any string-like value
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the key belongs to a namespace
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Human-readable label for report rows
    ///
    /// Strips a leading `<prefix>events:` marker, turns every `:` into
    /// ` - ` and splits on `_`, upper-casing the first character of each
    /// word. Only `_`-separated words are capitalised, so a segment after a
    /// ` - ` keeps its case unless it starts a `_` word.
    ///
    /// ```rust
    /// use series_report::types::SeriesKey;
    ///
    /// let key = SeriesKey::from("ts:events:user_signup:eu");
    /// assert_eq!(key.display_name("ts:"), "User Signup - eu");
    /// ```
    pub fn display_name(&self, prefix: &str) -> String {
        let marker = format!("{prefix}events:");
        let stripped = self.0.strip_prefix(marker.as_str()).unwrap_or(&self.0);

        stripped
            .replace(':', " - ")
            .split('_')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SeriesKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for SeriesKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl AsRef<str> for SeriesKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single sample in a time-series
///
/// # Fields
///
/// - `timestamp`: Unix timestamp in milliseconds
/// - `value`: finite IEEE 754 double (non-finite samples are dropped at decode)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Unix timestamp in milliseconds since epoch
    pub timestamp: i64,

    /// Measured value
    pub value: f64,
}

impl DataPoint {
    /// Create a new data point
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Query window (inclusive on both ends)
///
/// Unlike a validated range, a window may be constructed inverted
/// (`start > end`). Inverted windows are not an error anywhere in the
/// service: they simply select nothing.
///
/// ```rust
/// use series_report::types::TimeWindow;
///
/// let window = TimeWindow::new(1000, 2000);
/// assert!(window.contains(1000));
/// assert!(window.contains(2000));
/// assert!(!window.contains(2001));
///
/// let inverted = TimeWindow::new(2000, 1000);
/// assert!(inverted.is_inverted());
/// assert!(!inverted.contains(1500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start timestamp in milliseconds (inclusive)
    pub start: i64,

    /// End timestamp in milliseconds (inclusive)
    pub end: i64,
}

impl TimeWindow {
    /// Create a window; no validation is applied
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window covering the `days` days that end at `now_ms`
    pub fn last_days(now_ms: i64, days: u32) -> Self {
        let span = DAY_MS.saturating_mul(i64::from(days));
        Self {
            start: now_ms.saturating_sub(span),
            end: now_ms,
        }
    }

    /// Resolve optional request bounds
    ///
    /// Missing bounds fall back to the trailing `default_days` window ending
    /// at `now_ms`. Explicit bounds are used verbatim, even if inverted.
    pub fn resolve(start: Option<i64>, end: Option<i64>, now_ms: i64, default_days: u32) -> Self {
        let fallback = Self::last_days(now_ms, default_days);
        Self {
            start: start.unwrap_or(fallback.start),
            end: end.unwrap_or(fallback.end),
        }
    }

    /// True when `start > end`
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Check if a timestamp falls within this window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
