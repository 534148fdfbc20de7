//! Summaries → paginated document

use super::document::{Page, ReportDocument, ReportRow, ReportTotals, RowCells, ROWS_PER_PAGE};
use crate::aggregation::SeriesSummary;
use crate::types::TimeWindow;
use chrono::{DateTime, Utc};

/// Default report heading
pub const DEFAULT_TITLE: &str = "Event Analytics Report";

/// Builds [`ReportDocument`]s from ordered summaries
///
/// Rendering is a pure function of its inputs: the same summaries, window
/// and timestamp always produce an equal document.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    title: String,
    key_prefix: String,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new("ts:")
    }
}

impl ReportRenderer {
    /// Create a renderer; `key_prefix` is stripped from display names
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Override the report heading
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Render summaries in the order given
    ///
    /// Zero summaries produce a single empty page.
    pub fn render(
        &self,
        summaries: &[SeriesSummary],
        window: TimeWindow,
        generated_at: DateTime<Utc>,
    ) -> ReportDocument {
        let mut totals = ReportTotals::default();
        let rows: Vec<ReportRow> = summaries
            .iter()
            .map(|summary| {
                totals.series += 1;
                if summary.is_failed() {
                    totals.failed += 1;
                } else {
                    totals.data_points += summary.count as u64;
                }
                self.row(summary)
            })
            .collect();

        let mut pages: Vec<Page> = rows
            .chunks(ROWS_PER_PAGE)
            .enumerate()
            .map(|(i, chunk)| Page {
                number: i + 1,
                rows: chunk.to_vec(),
            })
            .collect();

        if pages.is_empty() {
            pages.push(Page {
                number: 1,
                rows: Vec::new(),
            });
        }

        ReportDocument {
            title: self.title.clone(),
            generated_at,
            window,
            totals,
            pages,
        }
    }

    fn row(&self, summary: &SeriesSummary) -> ReportRow {
        let cells = match &summary.fetch_error {
            Some(error) => RowCells::Failed {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
            None => RowCells::Stats {
                count: summary.count,
                min: summary.min,
                max: summary.max,
                mean: summary.mean,
                sum: summary.sum,
            },
        };

        ReportRow {
            key: summary.key.to_string(),
            display_name: summary.key.display_name(&self.key_prefix),
            cells,
            profile: summary.profile.clone(),
        }
    }
}
