//! Typed decoding of raw store replies
//!
//! Store replies arrive untyped: a RedisTimeSeries `TS.RANGE` answer is an
//! array of `[timestamp, value]` pairs where the timestamp is usually an
//! integer and the value usually a bulk string, but RESP3 servers send
//! doubles and a corrupt sample can be anything. This module is the single
//! place where that shape is inspected.
//!
//! Decoding rules:
//! - a sample whose timestamp or value cannot be read is dropped
//! - non-finite values (`nan`, `inf`) are dropped
//! - samples outside the requested window are dropped
//! - the surviving points are returned ascending by timestamp; an unsorted
//!   reply is stable-sorted so duplicate timestamps keep their store order

use crate::types::{DataPoint, SeriesKey, TimeWindow};
use redis::Value;
use tracing::warn;

/// One field of a raw sample as the store delivered it
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    /// Integer reply
    Int(i64),
    /// String reply (bulk or simple)
    Text(String),
    /// Double reply (RESP3)
    Double(f64),
    /// Anything else, including a missing field
    Missing,
}

impl RawField {
    fn as_timestamp(&self) -> Option<i64> {
        match self {
            RawField::Int(ts) => Some(*ts),
            RawField::Text(text) => text.trim().parse().ok(),
            RawField::Double(_) | RawField::Missing => None,
        }
    }

    fn as_value(&self) -> Option<f64> {
        let value = match self {
            RawField::Int(v) => *v as f64,
            RawField::Double(v) => *v,
            RawField::Text(text) => text.trim().parse::<f64>().ok()?,
            RawField::Missing => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<Value> for RawField {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(v) => RawField::Int(v),
            Value::Double(v) => RawField::Double(v),
            Value::BulkString(bytes) => RawField::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Value::SimpleString(text) => RawField::Text(text),
            _ => RawField::Missing,
        }
    }
}

/// A `(timestamp, value)` pair before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Raw timestamp field
    pub timestamp: RawField,
    /// Raw value field
    pub value: RawField,
}

impl RawSample {
    /// Raw sample from already-typed parts (as an in-memory store holds them)
    pub fn new(timestamp: i64, value: impl Into<String>) -> Self {
        Self {
            timestamp: RawField::Int(timestamp),
            value: RawField::Text(value.into()),
        }
    }

    /// Placeholder for an entry that was not a pair at all
    pub fn malformed() -> Self {
        Self {
            timestamp: RawField::Missing,
            value: RawField::Missing,
        }
    }

    /// Validate into a typed point
    pub fn decode(&self) -> Option<DataPoint> {
        Some(DataPoint::new(
            self.timestamp.as_timestamp()?,
            self.value.as_value()?,
        ))
    }
}

/// Split a `TS.RANGE` reply into raw samples
///
/// Returns `Err` with a description only when the reply as a whole has the
/// wrong shape; individual bad entries become [`RawSample::malformed`].
pub fn samples_from_reply(reply: Value) -> Result<Vec<RawSample>, String> {
    match reply {
        Value::Nil => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().map(sample_from_entry).collect()),
        other => Err(format!("unexpected TS.RANGE reply: {:?}", other)),
    }
}

fn sample_from_entry(entry: Value) -> RawSample {
    match entry {
        Value::Array(pair) if pair.len() == 2 => {
            let mut fields = pair.into_iter();
            let timestamp = fields.next().map(RawField::from).unwrap_or(RawField::Missing);
            let value = fields.next().map(RawField::from).unwrap_or(RawField::Missing);
            RawSample { timestamp, value }
        },
        _ => RawSample::malformed(),
    }
}

/// Turn raw samples into the ascending, windowed point sequence
pub fn decode_points<I>(key: &SeriesKey, window: TimeWindow, samples: I) -> Vec<DataPoint>
where
    I: IntoIterator<Item = RawSample>,
{
    let mut dropped = 0usize;
    let mut points: Vec<DataPoint> = samples
        .into_iter()
        .filter_map(|sample| {
            let point = sample.decode();
            if point.is_none() {
                dropped += 1;
            }
            point
        })
        .filter(|point| window.contains(point.timestamp))
        .collect();

    if dropped > 0 {
        warn!(key = %key, dropped, "Dropped malformed samples from range reply");
    }

    if !points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        points.sort_by_key(|point| point.timestamp);
    }

    points
}
