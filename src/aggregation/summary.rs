//! Per-series summary statistics

use super::profile::SeriesProfile;
use crate::error::GatewayError;
use crate::types::{DataPoint, SeriesKey};

/// Statistics for one series over a report window
///
/// A summary is either computed from points (`fetch_error == None`) or
/// records a failed fetch. Both have `count == 0` when there is no data, so
/// callers must check [`SeriesSummary::is_failed`] rather than the count to
/// tell an empty series from a broken one.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    /// Series key
    pub key: SeriesKey,
    /// Number of points in the window
    pub count: usize,
    /// Smallest value (0.0 when empty)
    pub min: f64,
    /// Largest value (0.0 when empty)
    pub max: f64,
    /// Arithmetic mean (0.0 when empty)
    pub mean: f64,
    /// Sum of values
    pub sum: f64,
    /// Earliest point
    pub first: Option<DataPoint>,
    /// Latest point
    pub last: Option<DataPoint>,
    /// Points within the window, ascending by timestamp
    pub sampled: Vec<DataPoint>,
    /// Bucketed sums; `None` when there are no points
    pub profile: Option<SeriesProfile>,
    /// Why the fetch failed, if it did
    pub fetch_error: Option<GatewayError>,
}

impl SeriesSummary {
    /// Compute statistics over ascending points
    pub fn from_points(key: SeriesKey, points: Vec<DataPoint>) -> Self {
        let Some(head) = points.first().copied() else {
            return Self::empty(key, None);
        };

        let (sum, min, max) = points.iter().fold(
            (0.0_f64, head.value, head.value),
            |(sum, min, max), p| (sum + p.value, min.min(p.value), max.max(p.value)),
        );
        let count = points.len();

        Self {
            key,
            count,
            min,
            max,
            mean: sum / count as f64,
            sum,
            first: Some(head),
            last: points.last().copied(),
            profile: SeriesProfile::from_points(&points),
            sampled: points,
            fetch_error: None,
        }
    }

    /// Summary for a series whose fetch failed
    pub fn failed(key: SeriesKey, error: GatewayError) -> Self {
        Self::empty(key, Some(error))
    }

    fn empty(key: SeriesKey, fetch_error: Option<GatewayError>) -> Self {
        Self {
            key,
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            sum: 0.0,
            first: None,
            last: None,
            sampled: Vec::new(),
            profile: None,
            fetch_error,
        }
    }

    /// Build from a gateway result
    pub fn from_result(key: SeriesKey, result: Result<Vec<DataPoint>, GatewayError>) -> Self {
        match result {
            Ok(points) => Self::from_points(key, points),
            Err(error) => Self::failed(key, error),
        }
    }

    /// True when the fetch for this series failed
    pub fn is_failed(&self) -> bool {
        self.fetch_error.is_some()
    }
}
