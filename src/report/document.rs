//! Paginated report document model
//!
//! The document is backend-neutral: it holds already-formatted rows grouped
//! into pages and nothing about how they will be laid out. Backends in
//! [`super::backend`] turn it into bytes.

use crate::aggregation::SeriesProfile;
use crate::types::TimeWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of rows on one page
pub const ROWS_PER_PAGE: usize = 50;

/// Rendered report, ready for a backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    /// Report heading
    pub title: String,
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Window the report covers
    pub window: TimeWindow,
    /// Aggregate counts over every row
    pub totals: ReportTotals,
    /// Pages in order; never empty
    pub pages: Vec<Page>,
}

impl ReportDocument {
    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Iterate over every row in page order
    pub fn rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.pages.iter().flat_map(|p| p.rows.iter())
    }

    /// Total rows across all pages
    pub fn row_count(&self) -> usize {
        self.pages.iter().map(|p| p.rows.len()).sum()
    }
}

/// Report-wide counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    /// Rows in the report
    pub series: usize,
    /// Data points across all successfully fetched series
    pub data_points: u64,
    /// Rows whose fetch failed
    pub failed: usize,
}

/// One page of rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    /// At most [`ROWS_PER_PAGE`] rows
    pub rows: Vec<ReportRow>,
}

/// One series in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Series key
    pub key: String,
    /// Human-readable series name
    pub display_name: String,
    /// Statistics, or the failure that replaced them
    #[serde(flatten)]
    pub cells: RowCells,
    /// Bucketed sums; absent for failed and empty series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SeriesProfile>,
}

/// Row content
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowCells {
    /// Series was fetched; values are 0.0 when `count == 0`
    Stats {
        /// Points in the window
        count: usize,
        /// Smallest value
        min: f64,
        /// Largest value
        max: f64,
        /// Mean value
        mean: f64,
        /// Sum of values
        sum: f64,
    },
    /// Fetch failed
    Failed {
        /// Error kind (`StoreUnavailable`, `QueryFailed`)
        kind: String,
        /// Error message
        message: String,
    },
}

impl ReportRow {
    /// True when the row stands for a failed fetch
    pub fn is_failed(&self) -> bool {
        matches!(self.cells, RowCells::Failed { .. })
    }

    /// Marker shown in place of the numeric columns of a failed row
    pub fn error_marker(&self) -> Option<String> {
        match &self.cells {
            RowCells::Failed { kind, message } => Some(format!("ERROR [{}]: {}", kind, message)),
            RowCells::Stats { .. } => None,
        }
    }
}
