//! Configuration management for the report service
//!
//! TOML file support with serde defaults for every field, environment
//! variable overrides and validation.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:50053"
//! log_level = "info"
//!
//! [redis]
//! url = "redis://redis:6379"
//! pool_size = 16
//!
//! [report]
//! title = "Event Analytics Report"
//! key_prefix = "ts:"
//! max_concurrent_fetches = 8
//! default_window_days = 7
//! format = "text"
//! ```

use crate::aggregation::{AggregatorConfig, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::error::{Error, Result};
use crate::redis::gateway::DEFAULT_SCAN_COUNT;
use crate::redis::util::extract_host_port;
use crate::redis::RedisConfig;
use crate::report::{ReportFormat, DEFAULT_TITLE};
use crate::service::{ReportServiceConfig, DEFAULT_KEY_PREFIX, DEFAULT_WINDOW_DAYS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Store connection settings
    #[serde(default)]
    pub redis: RedisSection,

    /// Report generation settings
    #[serde(default)]
    pub report: ReportSection,
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerSection {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Allowed CORS origins (empty = allow any)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// `[redis]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RedisSection {
    /// Connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Maximum concurrent commands
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connect timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-command timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Use `rediss://`
    #[serde(default)]
    pub tls_enabled: bool,

    /// `SCAN COUNT` hint for key discovery
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

/// `[report]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportSection {
    /// Heading printed on every report
    #[serde(default = "default_title")]
    pub title: String,

    /// Namespace searched during key discovery
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Bound on concurrent series fetches per report
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Window length used when a request omits its bounds
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,

    /// Output format (`text` or `json`)
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_listen_addr() -> String { "0.0.0.0:50053".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_redis_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_pool_size() -> u32 { 16 }
fn default_timeout_secs() -> u64 { 5 }
fn default_scan_count() -> usize { DEFAULT_SCAN_COUNT }
fn default_title() -> String { DEFAULT_TITLE.to_string() }
fn default_key_prefix() -> String { DEFAULT_KEY_PREFIX.to_string() }
fn default_max_concurrent_fetches() -> usize { DEFAULT_MAX_CONCURRENT_FETCHES }
fn default_window_days() -> u32 { DEFAULT_WINDOW_DAYS }
fn default_format() -> String { ReportFormat::default().to_string() }

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connection_timeout_secs: default_timeout_secs(),
            command_timeout_secs: default_timeout_secs(),
            tls_enabled: false,
            scan_count: default_scan_count(),
        }
    }
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            key_prefix: default_key_prefix(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            default_window_days: default_window_days(),
            format: default_format(),
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Configuration(format!("{} ({})", e, path.display())))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// | Variable                | Effect                               |
    /// |-------------------------|--------------------------------------|
    /// | `REDIS_URL`             | replaces `redis.url`                 |
    /// | `REDIS_HOST`/`REDIS_PORT` | rebuild `redis.url` (if no `REDIS_URL`) |
    /// | `REPORT_LISTEN_ADDR`    | replaces `server.listen_addr`        |
    /// | `GRPC_PORT` or `PORT`   | replaces the port of `listen_addr`   |
    /// | `RUST_LOG`              | replaces `server.log_level`          |
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Redis
        if let Some(url) = lookup("REDIS_URL") {
            self.redis.url = url;
        } else {
            let host = lookup("REDIS_HOST");
            let port = lookup("REDIS_PORT").and_then(|p| p.parse::<u16>().ok());
            if host.is_some() || port.is_some() {
                let (current_host, current_port) = extract_host_port(&self.redis.url)
                    .unwrap_or_else(|| ("127.0.0.1".to_string(), 6379));
                self.redis.url = format!(
                    "redis://{}:{}",
                    host.unwrap_or(current_host),
                    port.unwrap_or(current_port)
                );
            }
        }

        // Server
        if let Some(addr) = lookup("REPORT_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        let port = lookup("GRPC_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| p.parse::<u16>().ok());
        if let Some(port) = port {
            let host = self
                .server
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.listen_addr = format!("{}:{}", host, port);
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.server.log_level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.trim().is_empty() {
            return Err(Error::Configuration("Listen address cannot be empty".to_string()));
        }

        self.redis_config().validate().map_err(Error::Configuration)?;

        if self.report.max_concurrent_fetches == 0 {
            return Err(Error::Configuration(
                "max_concurrent_fetches must be > 0".to_string(),
            ));
        }
        if self.report.key_prefix.is_empty() {
            return Err(Error::Configuration("Key prefix cannot be empty".to_string()));
        }
        if self.report.title.trim().is_empty() {
            return Err(Error::Configuration("Report title cannot be empty".to_string()));
        }
        self.report_format()?;

        Ok(())
    }

    /// Parsed output format
    pub fn report_format(&self) -> Result<ReportFormat> {
        self.report.format.parse().map_err(Error::Configuration)
    }

    /// Connection pool settings
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis.url.clone(),
            max_in_flight: self.redis.pool_size,
            connect_timeout: Duration::from_secs(self.redis.connection_timeout_secs),
            command_timeout: Duration::from_secs(self.redis.command_timeout_secs),
            tls_enabled: self.redis.tls_enabled,
            ..Default::default()
        }
    }

    /// Report service settings
    pub fn service_config(&self) -> ReportServiceConfig {
        ReportServiceConfig {
            title: self.report.title.clone(),
            key_prefix: self.report.key_prefix.clone(),
            default_window_days: self.report.default_window_days,
            aggregator: AggregatorConfig {
                max_concurrent_fetches: self.report.max_concurrent_fetches,
            },
        }
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))
    }
}
