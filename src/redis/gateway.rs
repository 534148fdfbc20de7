//! RedisTimeSeries gateway
//!
//! Maps the gateway contract onto Redis primitives:
//!
//! ```text
//! list_keys(prefix)         → SCAN 0 MATCH <prefix>* COUNT n   (repeated until cursor 0)
//! fetch_range(key, window)  → TS.RANGE key start end
//! ```
//!
//! `SCAN` is used instead of `KEYS` so discovery never blocks the server on
//! large keyspaces. `SCAN` may return a key more than once; duplicates are
//! removed here. Keys that are not valid UTF-8 are skipped with a warning.

use super::connection::RedisPool;
use crate::error::GatewayError;
use crate::gateway::decode::{decode_points, samples_from_reply};
use crate::gateway::{HealthStatus, TimeSeriesGateway};
use crate::types::{DataPoint, SeriesKey, TimeWindow};
use async_trait::async_trait;
use redis::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default `COUNT` hint for `SCAN`
pub const DEFAULT_SCAN_COUNT: usize = 500;

/// Gateway over a RedisTimeSeries server
pub struct RedisTimeSeriesGateway {
    pool: Arc<RedisPool>,
    scan_count: usize,
}

impl RedisTimeSeriesGateway {
    /// Create a gateway over an established pool
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self {
            pool,
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    /// Set the `SCAN COUNT` hint
    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }
}

/// Escape glob metacharacters so a prefix matches literally in `MATCH`
pub fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 4);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Keep the UTF-8 keys of a `SCAN` batch that start with `prefix`
fn keys_from_batch(batch: Vec<Vec<u8>>, prefix: &str) -> Vec<String> {
    batch
        .into_iter()
        .filter_map(|raw| match String::from_utf8(raw) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(
                    key = %String::from_utf8_lossy(e.as_bytes()),
                    "Skipping series key that is not valid UTF-8"
                );
                None
            },
        })
        .filter(|key| key.starts_with(prefix))
        .collect()
}

#[async_trait]
impl TimeSeriesGateway for RedisTimeSeriesGateway {
    fn gateway_id(&self) -> &str {
        "redis-timeseries-gateway-v1"
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<SeriesKey>, GatewayError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let count = self.scan_count;
        let mut cursor: u64 = 0;
        let mut keys = BTreeSet::new();

        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = self
                .pool
                .execute(|mut conn| {
                    let pattern = pattern.clone();
                    async move {
                        redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(pattern)
                            .arg("COUNT")
                            .arg(count)
                            .query_async(&mut conn)
                            .await
                    }
                })
                .await
                .map_err(|e| e.for_key(prefix))?;

            keys.extend(keys_from_batch(batch, prefix));

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix, keys = keys.len(), "Discovered series keys");
        Ok(keys.into_iter().map(SeriesKey::from).collect())
    }

    async fn fetch_range(
        &self,
        key: &SeriesKey,
        window: TimeWindow,
    ) -> Result<Vec<DataPoint>, GatewayError> {
        // RedisTimeSeries timestamps are unsigned
        if window.is_inverted() || window.end < 0 {
            return Ok(Vec::new());
        }
        let start = window.start.max(0);
        let end = window.end;
        let key_str = key.as_str();

        let reply: Value = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("TS.RANGE")
                    .arg(key_str)
                    .arg(start)
                    .arg(end)
                    .query_async(&mut conn)
                    .await
            })
            .await
            .map_err(|e| e.for_key(key_str))?;

        let samples =
            samples_from_reply(reply).map_err(|reason| GatewayError::query_failed(key_str, reason))?;
        let points = decode_points(key, window, samples);

        debug!(key = key_str, points = points.len(), "Fetched range");
        Ok(points)
    }

    async fn health_check(&self) -> HealthStatus {
        self.pool.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("ts:"), "ts:");
        assert_eq!(escape_glob("ts:[a]*?"), "ts:\\[a\\]\\*\\?");
        assert_eq!(escape_glob("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_invalid_utf8_key_does_not_poison_batch() {
        let batch = vec![
            b"ts:events:page_view".to_vec(),
            vec![b't', b's', b':', 0xff, 0xfe],
            b"other:key".to_vec(),
            b"ts:events:signup".to_vec(),
        ];
        assert_eq!(
            keys_from_batch(batch, "ts:"),
            vec!["ts:events:page_view", "ts:events:signup"]
        );
    }
}
