//! Report service boundary
//!
//! [`ReportService`] exposes the remote operations:
//!
//! - [`ReportService::get_time_series_data`] - raw points for one series
//! - [`ReportService::get_all_time_series_data`] - raw points for every series
//! - [`ReportService::generate_report`] - discover, aggregate, render, serialize
//!
//! Report generation fails only when key discovery fails. Individual series
//! that cannot be fetched become error rows in the document. A
//! [`SeriesFilter`] narrows discovery to named metrics.
//!
//! # Example
//!
//! ```rust
//! use series_report::gateway::InMemoryGateway;
//! use series_report::service::{FixedClock, ReportService, ReportServiceConfig};
//! use series_report::types::{DataPoint, TimeWindow};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let gateway = Arc::new(InMemoryGateway::new());
//! gateway.insert_points("ts:events:signup", &[DataPoint::new(1_000, 3.0)]);
//!
//! let service = ReportService::new(gateway, ReportServiceConfig::default())
//!     .with_clock(Arc::new(FixedClock::from_millis(10_000)));
//!
//! let report = service.generate_report(TimeWindow::new(0, 5_000)).await.unwrap();
//! assert_eq!(report.page_count, 1);
//! assert_eq!(report.file_name(), "report-10000.txt");
//! # }
//! ```

use crate::aggregation::{AggregatorConfig, SeriesAggregator, SeriesSummary};
use crate::error::{GatewayError, ReportError};
use crate::gateway::TimeSeriesGateway;
use crate::report::{DocumentBackend, ReportRenderer, ReportTotals, TextBackend, DEFAULT_TITLE};
use crate::types::{DataPoint, SeriesKey, TimeWindow};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default key namespace
pub const DEFAULT_KEY_PREFIX: &str = "ts:";

/// Default report window when a request omits its bounds
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Source of the report generation time
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pin to a millisecond timestamp (falls back to the epoch if out of range)
    pub fn from_millis(ms: i64) -> Self {
        Self(DateTime::from_timestamp_millis(ms).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Service settings
#[derive(Debug, Clone)]
pub struct ReportServiceConfig {
    /// Namespace prefix used for key discovery
    pub key_prefix: String,
    /// Trailing window used when request bounds are missing
    pub default_window_days: u32,
    /// Heading of rendered documents
    pub title: String,
    /// Fan-out settings
    pub aggregator: AggregatorConfig,
}

impl Default for ReportServiceConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_window_days: DEFAULT_WINDOW_DAYS,
            title: DEFAULT_TITLE.to_string(),
            aggregator: AggregatorConfig::default(),
        }
    }
}

/// Restricts which discovered series a request covers
///
/// An entry matches a key either verbatim or once the key prefix is
/// prepended, so `events:page_view` and `ts:events:page_view` select the
/// same series under the `ts:` prefix. Entries naming no discovered key
/// select nothing. The default filter selects every series.
///
/// ```rust
/// use series_report::service::SeriesFilter;
///
/// let filter = SeriesFilter::metrics(["events:page_view", " "]);
/// assert!(filter.matches("ts:events:page_view", "ts:"));
/// assert!(!filter.matches("ts:events:signup", "ts:"));
/// assert!(SeriesFilter::default().matches("ts:anything", "ts:"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesFilter {
    metrics: Vec<String>,
}

impl SeriesFilter {
    /// Select only the named metrics; blank entries are ignored
    pub fn metrics<I, S>(metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let metrics = metrics
            .into_iter()
            .map(|m| m.as_ref().trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self { metrics }
    }

    /// True when no metric was named
    pub fn is_all(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Check a discovered key against the filter
    pub fn matches(&self, key: &str, prefix: &str) -> bool {
        self.is_all()
            || self.metrics.iter().any(|m| {
                key == m || key.strip_prefix(prefix).is_some_and(|rest| rest == m)
            })
    }
}

/// A serialized report
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    /// Document bytes
    pub bytes: Bytes,
    /// Pages in the document
    pub page_count: usize,
    /// Generation time
    pub generated_at: DateTime<Utc>,
    /// Window the report covers
    pub window: TimeWindow,
    /// Report-wide counts
    pub totals: ReportTotals,
    /// MIME type of `bytes`
    pub content_type: &'static str,
    file_extension: &'static str,
}

impl GeneratedReport {
    /// Generation time as RFC 3339
    pub fn generated_at_rfc3339(&self) -> String {
        self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Suggested download name, `report-<generated ms>.<ext>`
    pub fn file_name(&self) -> String {
        format!(
            "report-{}.{}",
            self.generated_at.timestamp_millis(),
            self.file_extension
        )
    }
}

/// Report operations over a time-series gateway
pub struct ReportService {
    gateway: Arc<dyn TimeSeriesGateway>,
    aggregator: SeriesAggregator,
    renderer: ReportRenderer,
    backend: Arc<dyn DocumentBackend>,
    clock: Arc<dyn Clock>,
    config: ReportServiceConfig,
}

impl ReportService {
    /// Create a service with the wall clock and the text backend
    pub fn new(gateway: Arc<dyn TimeSeriesGateway>, config: ReportServiceConfig) -> Self {
        let aggregator = SeriesAggregator::new(Arc::clone(&gateway), config.aggregator.clone());
        let renderer = ReportRenderer::new(config.key_prefix.clone()).with_title(config.title.clone());

        Self {
            gateway,
            aggregator,
            renderer,
            backend: Arc::new(TextBackend),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the document backend
    pub fn with_backend(mut self, backend: Arc<dyn DocumentBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Underlying gateway
    pub fn gateway(&self) -> &Arc<dyn TimeSeriesGateway> {
        &self.gateway
    }

    /// Active document backend
    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    /// Service settings
    pub fn config(&self) -> &ReportServiceConfig {
        &self.config
    }

    /// Fill missing request bounds with the trailing default window
    pub fn resolve_window(&self, start: Option<i64>, end: Option<i64>) -> TimeWindow {
        TimeWindow::resolve(
            start,
            end,
            self.clock.now().timestamp_millis(),
            self.config.default_window_days,
        )
    }

    /// Points of one series within the window, ascending by timestamp
    ///
    /// An inverted window returns an empty vector without touching the store.
    pub async fn get_time_series_data(
        &self,
        key: &SeriesKey,
        window: TimeWindow,
    ) -> Result<Vec<DataPoint>, GatewayError> {
        if window.is_inverted() {
            debug!(key = %key, start = window.start, end = window.end, "Inverted window, returning no points");
            return Ok(Vec::new());
        }
        self.gateway.fetch_range(key, window).await
    }

    /// Points of every series under the key prefix that passes `filter`
    ///
    /// Entries come back in key order. A series whose fetch failed carries
    /// `fetch_error`; only key discovery failing fails the call. An
    /// inverted window yields empty entries without fetching.
    pub async fn get_all_time_series_data(
        &self,
        window: TimeWindow,
        filter: &SeriesFilter,
    ) -> Result<Vec<SeriesSummary>, GatewayError> {
        let mut keys = self.discover(filter).await?;

        if window.is_inverted() {
            debug!(start = window.start, end = window.end, "Inverted window, returning no points");
            keys.sort();
            keys.dedup();
            return Ok(keys
                .into_iter()
                .map(|key| SeriesSummary::from_points(key, Vec::new()))
                .collect());
        }

        Ok(self.aggregator.compute_all(keys, window).await)
    }

    /// Build a report over every series under the key prefix
    ///
    /// Fails with [`ReportError::GenerationFailed`] only when key discovery
    /// fails; per-series failures appear as error rows.
    pub async fn generate_report(&self, window: TimeWindow) -> Result<GeneratedReport, ReportError> {
        self.generate_filtered_report(window, &SeriesFilter::default()).await
    }

    /// [`generate_report`](Self::generate_report) restricted to `filter`
    pub async fn generate_filtered_report(
        &self,
        window: TimeWindow,
        filter: &SeriesFilter,
    ) -> Result<GeneratedReport, ReportError> {
        let started = Instant::now();
        let generated_at = self.clock.now();

        let keys = self.discover(filter).await.map_err(ReportError::GenerationFailed)?;

        let summaries = self.aggregator.compute_all(keys, window).await;
        let document = self.renderer.render(&summaries, window, generated_at);
        let bytes = self.backend.serialize(&document)?;

        info!(
            series = document.totals.series,
            failed = document.totals.failed,
            data_points = document.totals.data_points,
            pages = document.page_count(),
            bytes = bytes.len(),
            backend = self.backend.name(),
            filtered = !filter.is_all(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report generated"
        );

        Ok(GeneratedReport {
            bytes,
            page_count: document.page_count(),
            generated_at,
            window,
            totals: document.totals,
            content_type: self.backend.content_type(),
            file_extension: self.backend.file_extension(),
        })
    }

    /// [`generate_filtered_report`](Self::generate_filtered_report) that stops when `token` fires
    ///
    /// On cancellation every in-flight fetch is aborted and no document is
    /// produced.
    pub async fn generate_report_cancellable(
        &self,
        window: TimeWindow,
        filter: &SeriesFilter,
        token: &CancellationToken,
    ) -> Result<GeneratedReport, ReportError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Report generation cancelled");
                Err(ReportError::Cancelled)
            }
            result = self.generate_filtered_report(window, filter) => result,
        }
    }

    async fn discover(&self, filter: &SeriesFilter) -> Result<Vec<SeriesKey>, GatewayError> {
        let prefix = &self.config.key_prefix;
        let mut keys = self.gateway.list_keys(prefix).await.map_err(|e| {
            warn!(prefix = %prefix, error = %e, "Key discovery failed");
            e
        })?;

        if !filter.is_all() {
            let discovered = keys.len();
            keys.retain(|key| filter.matches(key.as_str(), prefix));
            debug!(discovered, selected = keys.len(), "Applied metric filter");
        }
        Ok(keys)
    }
}
