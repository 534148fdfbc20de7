//! Time-bucketed activity profile of one series
//!
//! Points are summed into calendar buckets (UTC). The bucket width depends
//! on how much time the series covers:
//!
//! | Span of points (last - first) | Bucket | Label example   |
//! |-------------------------------|--------|-----------------|
//! | up to 24h                     | minute | `14:05`         |
//! | more than 24h                 | hour   | `Nov 14 22:00`  |
//!
//! Only the first [`MAX_PROFILE_BUCKETS`] non-empty buckets are kept.

use crate::types::{DataPoint, DAY_MS};
use chrono::DateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Most buckets kept per series
pub const MAX_PROFILE_BUCKETS: usize = 20;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketWidth {
    /// One-minute buckets
    Minute,
    /// One-hour buckets
    Hour,
}

impl BucketWidth {
    /// Width for points spanning `span_ms`
    pub fn for_span(span_ms: i64) -> Self {
        if span_ms > DAY_MS {
            BucketWidth::Hour
        } else {
            BucketWidth::Minute
        }
    }

    /// Lowercase unit name
    pub fn name(self) -> &'static str {
        match self {
            BucketWidth::Minute => "minute",
            BucketWidth::Hour => "hour",
        }
    }

    /// Width in milliseconds
    pub fn millis(self) -> i64 {
        match self {
            BucketWidth::Minute => MINUTE_MS,
            BucketWidth::Hour => HOUR_MS,
        }
    }

    /// Start of the bucket holding `timestamp`
    pub fn bucket_start(self, timestamp: i64) -> i64 {
        timestamp - timestamp.rem_euclid(self.millis())
    }

    /// Human label of the bucket starting at `start`
    pub fn label(self, start: i64) -> String {
        let Some(dt) = DateTime::from_timestamp_millis(start) else {
            return start.to_string();
        };
        match self {
            BucketWidth::Minute => dt.format("%H:%M").to_string(),
            BucketWidth::Hour => dt.format("%b %-d %H:00").to_string(),
        }
    }
}

/// Sum of values in one bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileBucket {
    /// Bucket start, milliseconds since epoch
    pub start: i64,
    /// Display label
    pub label: String,
    /// Sum of the values that fell in the bucket
    pub sum: f64,
}

/// Bucketed sums for one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesProfile {
    /// Width every bucket shares
    pub width: BucketWidth,
    /// Non-empty buckets in time order, at most [`MAX_PROFILE_BUCKETS`]
    pub buckets: Vec<ProfileBucket>,
}

impl SeriesProfile {
    /// Profile of ascending points; `None` when there are none
    pub fn from_points(points: &[DataPoint]) -> Option<Self> {
        let (first, last) = (points.first()?, points.last()?);
        let width = BucketWidth::for_span(last.timestamp.saturating_sub(first.timestamp));

        let mut sums: BTreeMap<i64, f64> = BTreeMap::new();
        for point in points {
            *sums.entry(width.bucket_start(point.timestamp)).or_default() += point.value;
        }

        let buckets = sums
            .into_iter()
            .take(MAX_PROFILE_BUCKETS)
            .map(|(start, sum)| ProfileBucket {
                start,
                label: width.label(start),
                sum,
            })
            .collect();

        Some(Self { width, buckets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14T22:13:20Z
    const BASE: i64 = 1_700_000_000_000;

    #[test]
    fn test_empty_has_no_profile() {
        assert!(SeriesProfile::from_points(&[]).is_none());
    }

    #[test]
    fn test_minute_buckets_sum_values() {
        let points = [
            DataPoint::new(BASE, 1.0),
            DataPoint::new(BASE + 30_000, 2.0),
            DataPoint::new(BASE + 60_000, 4.0),
        ];
        let profile = SeriesProfile::from_points(&points).unwrap();

        assert_eq!(profile.width, BucketWidth::Minute);
        let sums: Vec<(&str, f64)> = profile.buckets.iter().map(|b| (b.label.as_str(), b.sum)).collect();
        assert_eq!(sums, vec![("22:13", 3.0), ("22:14", 4.0)]);
        assert_eq!(profile.buckets[0].start % MINUTE_MS, 0);
    }

    #[test]
    fn test_span_over_a_day_uses_hours() {
        let points = [
            DataPoint::new(BASE, 1.0),
            DataPoint::new(BASE + 10 * MINUTE_MS, 1.0),
            DataPoint::new(BASE + DAY_MS + 1, 5.0),
        ];
        let profile = SeriesProfile::from_points(&points).unwrap();

        assert_eq!(profile.width, BucketWidth::Hour);
        assert_eq!(profile.buckets.len(), 2);
        assert_eq!(profile.buckets[0].label, "Nov 14 22:00");
        assert_eq!(profile.buckets[0].sum, 2.0);
        assert_eq!(profile.buckets[1].label, "Nov 15 22:00");
    }

    #[test]
    fn test_exactly_one_day_stays_minutely() {
        let points = [DataPoint::new(BASE, 1.0), DataPoint::new(BASE + DAY_MS, 1.0)];
        let profile = SeriesProfile::from_points(&points).unwrap();
        assert_eq!(profile.width, BucketWidth::Minute);
    }

    #[test]
    fn test_bucket_count_is_capped() {
        let points: Vec<DataPoint> = (0..45)
            .map(|i| DataPoint::new(BASE + i * MINUTE_MS, 1.0))
            .collect();
        let profile = SeriesProfile::from_points(&points).unwrap();

        assert_eq!(profile.buckets.len(), MAX_PROFILE_BUCKETS);
        assert_eq!(profile.buckets[0].label, "22:13");
        assert_eq!(profile.buckets[19].label, "22:32");
    }

    #[test]
    fn test_negative_timestamps_align_down() {
        assert_eq!(BucketWidth::Minute.bucket_start(-1), -MINUTE_MS);
        assert_eq!(BucketWidth::Hour.bucket_start(HOUR_MS + 5), HOUR_MS);
    }
}
