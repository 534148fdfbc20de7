//! Shared Redis connection with bounded concurrency, retry and error
//! classification
//!
//! One multiplexed connection carries every gateway command. A semaphore
//! caps the commands in flight, each command runs under a timeout, and
//! transient failures are retried with jittered exponential backoff. A
//! dropped connection is re-established on the next attempt.
//!
//! Every Redis error leaving the pool is classified into a [`GatewayError`]:
//! transport-level failures become `StoreUnavailable`, server rejections
//! become `QueryFailed`.
//!
//! # Example
//!
//! ```rust,no_run
//! use series_report::redis::{RedisConfig, RedisPool};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = RedisPool::new(RedisConfig::with_url("redis://localhost:6379")).await?;
//! let pong: String = pool
//!     .execute(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::GatewayError;
use crate::gateway::HealthStatus;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use super::util::{connection_error_message, safe_redis_error};

/// Upper bound accepted for [`RedisConfig::max_in_flight`]
pub const MAX_IN_FLIGHT_LIMIT: u32 = 1000;

/// A PING slower than this reports the store as degraded
const DEGRADED_PING: Duration = Duration::from_millis(100);

/// Settings for [`RedisPool`]
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Server URL; credentials are never logged
    pub url: String,
    /// Commands allowed in flight at once
    pub max_in_flight: u32,
    /// Limit on establishing the connection
    pub connect_timeout: Duration,
    /// Limit on a single command, range queries included
    pub command_timeout: Duration,
    /// Backoff for transient failures
    pub retry: RetryPolicy,
    /// Connect with `rediss://`
    pub tls_enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_in_flight: 16,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            tls_enabled: false,
        }
    }
}

impl RedisConfig {
    /// Defaults pointed at `url`
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Reject settings the pool cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.max_in_flight == 0 || self.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(format!(
                "Pool size must be between 1 and {}",
                MAX_IN_FLIGHT_LIMIT
            ));
        }

        #[cfg(not(feature = "redis-tls"))]
        if self.tls_enabled {
            return Err(
                "TLS is enabled but the 'redis-tls' feature is not compiled".to_string(),
            );
        }

        Ok(())
    }

    /// URL handed to the client, scheme forced to match `tls_enabled`
    fn client_url(&self) -> String {
        let rest = self
            .url
            .strip_prefix("rediss://")
            .or_else(|| self.url.strip_prefix("redis://"));
        match rest {
            Some(rest) if self.tls_enabled => format!("rediss://{}", rest),
            Some(rest) => format!("redis://{}", rest),
            None => self.url.clone(),
        }
    }
}

/// Jittered exponential backoff
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay, before jitter
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt + 1`: `base * 2^attempt`, capped, plus up to 25%
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        delay.mul_f64(1.0 + rand::random::<f64>() * 0.25)
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    commands: AtomicU64,
    command_failures: AtomicU64,
    retries: AtomicU64,
    latency_us: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PoolCounters {
    fn command_ok(&self, latency: Duration) {
        bump(&self.commands);
        self.latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolMetricsSnapshot {
        let commands = self.commands.load(Ordering::Relaxed);
        let latency = self.latency_us.load(Ordering::Relaxed);
        PoolMetricsSnapshot {
            connections_created: self.connects.load(Ordering::Relaxed),
            connection_failures: self.connect_failures.load(Ordering::Relaxed),
            commands_executed: commands,
            command_failures: self.command_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            average_latency_us: if commands == 0 {
                0.0
            } else {
                latency as f64 / commands as f64
            },
        }
    }
}

/// Pool counters as served on `/api/v1/stats`
#[derive(Debug, Clone, Serialize)]
pub struct PoolMetricsSnapshot {
    /// Connections established during the pool lifetime
    pub connections_created: u64,
    /// Failed connection attempts
    pub connection_failures: u64,
    /// Successful commands
    pub commands_executed: u64,
    /// Failed command attempts (each retry counts)
    pub command_failures: u64,
    /// Retry attempts
    pub retries: u64,
    /// Average successful command latency in microseconds
    pub average_latency_us: f64,
}

/// Shared Redis connection
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    config: RedisConfig,
    counters: PoolCounters,
    in_flight: Semaphore,
}

impl RedisPool {
    /// Validate `config` and establish the initial connection
    ///
    /// Fails with `StoreUnavailable` if Redis cannot be reached.
    pub async fn new(config: RedisConfig) -> Result<Self, GatewayError> {
        config.validate().map_err(GatewayError::StoreUnavailable)?;

        let client = Client::open(config.client_url().as_str())
            .map_err(|e| GatewayError::StoreUnavailable(safe_redis_error(&config.url, &e)))?;

        let pool = Self {
            client,
            connection: RwLock::new(None),
            in_flight: Semaphore::new(config.max_in_flight as usize),
            config,
            counters: PoolCounters::default(),
        };

        pool.connect().await?;
        debug!(max_in_flight = pool.config.max_in_flight, "Redis pool ready");
        Ok(pool)
    }

    async fn connect(&self) -> Result<MultiplexedConnection, GatewayError> {
        let start = Instant::now();

        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await;

        let conn = match attempt {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                bump(&self.counters.connect_failures);
                return Err(GatewayError::StoreUnavailable(safe_redis_error(&self.config.url, &e)));
            },
            Err(_) => {
                bump(&self.counters.connect_failures);
                return Err(GatewayError::StoreUnavailable(connection_error_message(
                    &self.config.url,
                    "Connection timeout",
                )));
            },
        };

        *self.connection.write().await = Some(conn.clone());
        bump(&self.counters.connects);
        debug!(elapsed = ?start.elapsed(), "Redis connection established");
        Ok(conn)
    }

    async fn current_connection(&self) -> Result<MultiplexedConnection, GatewayError> {
        let existing = self.connection.read().await.clone();
        match existing {
            Some(conn) => Ok(conn),
            None => self.connect().await,
        }
    }

    /// Execute a command with timeout, retry and error classification
    ///
    /// `f` receives a clone of the multiplexed connection and may be called
    /// more than once.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T, GatewayError>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = Result<T, RedisError>>,
    {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| GatewayError::StoreUnavailable("Connection pool closed".to_string()))?;

        let mut attempt = 0;
        loop {
            let conn = self.current_connection().await?;
            let start = Instant::now();

            let error = match tokio::time::timeout(self.config.command_timeout, f(conn)).await {
                Ok(Ok(value)) => {
                    self.counters.command_ok(start.elapsed());
                    return Ok(value);
                },
                Ok(Err(e)) => {
                    bump(&self.counters.command_failures);
                    if !is_retriable_error(&e) {
                        return Err(self.classify(&e));
                    }
                    if e.is_connection_dropped() || e.is_io_error() {
                        *self.connection.write().await = None;
                    }
                    self.classify(&e)
                },
                Err(_) => {
                    bump(&self.counters.command_failures);
                    GatewayError::StoreUnavailable(connection_error_message(
                        &self.config.url,
                        "Command timeout",
                    ))
                },
            };

            if attempt >= self.config.retry.max_retries {
                return Err(error);
            }

            bump(&self.counters.retries);
            let delay = self.config.retry.backoff(attempt);
            warn!(
                attempt = attempt + 1,
                delay = ?delay,
                error = %error,
                "Redis command failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn classify(&self, e: &RedisError) -> GatewayError {
        if is_unavailable_error(e) {
            GatewayError::StoreUnavailable(safe_redis_error(&self.config.url, e))
        } else {
            // Key is filled in by the caller that knows it
            GatewayError::query_failed("", e.to_string())
        }
    }

    /// Send PING; slow replies count as degraded
    pub async fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let result = self
            .execute(|mut conn| async move { redis::cmd("PING").query_async::<String>(&mut conn).await })
            .await;

        match result {
            Ok(_) if start.elapsed() > DEGRADED_PING => HealthStatus::Degraded,
            Ok(_) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                HealthStatus::Unhealthy
            },
        }
    }

    /// Command and connection counters
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.counters.snapshot()
    }
}

/// Transient errors worth another attempt
fn is_retriable_error(e: &RedisError) -> bool {
    e.is_connection_dropped()
        || e.is_timeout()
        || e.is_io_error()
        || matches!(
            e.kind(),
            redis::ErrorKind::BusyLoadingError | redis::ErrorKind::TryAgain
        )
}

/// Errors meaning the store as a whole cannot answer
fn is_unavailable_error(e: &RedisError) -> bool {
    e.is_connection_dropped()
        || e.is_connection_refusal()
        || e.is_timeout()
        || e.is_io_error()
        || matches!(
            e.kind(),
            redis::ErrorKind::AuthenticationFailed
                | redis::ErrorKind::BusyLoadingError
                | redis::ErrorKind::TryAgain
                | redis::ErrorKind::ClusterDown
                | redis::ErrorKind::MasterDown
        )
}
