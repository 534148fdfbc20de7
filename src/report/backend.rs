//! Document serialization backends
//!
//! A [`DocumentBackend`] turns a [`ReportDocument`] into bytes. Backends are
//! deterministic: equal documents always serialize to identical bytes.
//!
//! | Backend         | Content type                  | Extension |
//! |-----------------|-------------------------------|-----------|
//! | [`TextBackend`] | `text/plain; charset=utf-8`   | `txt`     |
//! | [`JsonBackend`] | `application/json`            | `json`    |

use super::document::{ReportDocument, ReportRow, RowCells};
use crate::error::RenderError;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

/// Serializes a rendered document
pub trait DocumentBackend: Send + Sync {
    /// Backend name, as accepted by [`ReportFormat::from_str`]
    fn name(&self) -> &'static str;

    /// MIME type of the serialized bytes
    fn content_type(&self) -> &'static str;

    /// File extension without the dot
    fn file_extension(&self) -> &'static str;

    /// Encode the document
    fn serialize(&self, document: &ReportDocument) -> Result<Bytes, RenderError>;
}

/// Selectable output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain text tables
    #[default]
    Text,
    /// JSON document
    Json,
}

impl ReportFormat {
    /// Backend for this format
    pub fn backend(self) -> Arc<dyn DocumentBackend> {
        match self {
            ReportFormat::Text => Arc::new(TextBackend),
            ReportFormat::Json => Arc::new(JsonBackend),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

/// Format a millisecond timestamp as RFC 3339 (UTC)
fn format_millis(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ms.to_string(),
    }
}

/// Plain text backend
///
/// Layout per page:
///
/// ```text
/// Event Analytics Report
/// Period:    2024-01-01T00:00:00Z to 2024-01-08T00:00:00Z
/// Generated: 2024-01-08T00:00:00Z
/// Series: 3    Data points: 120    Failed: 1
///
/// Page 1 of 1
/// NAME                             COUNT         MIN         MAX        MEAN         SUM  KEY
/// Page View                           40        1.00        9.00        4.50      180.00  ts:events:page_view
///     by hour: Jan 7 10:00 12.00 | Jan 7 11:00 168.00
/// Checkout                        ERROR [QueryFailed]: ...                                ts:events:checkout
/// ```
///
/// The display name is truncated to fit its column; the key is always
/// printed in full. Pages are separated by a form feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextBackend;

const NAME_WIDTH: usize = 32;

/// Width of the numeric columns (COUNT plus four values)
const STATS_WIDTH: usize = 6 + 4 * 12;

impl TextBackend {
    fn write_header(out: &mut String, document: &ReportDocument) -> fmt::Result {
        writeln!(out, "{}", document.title)?;
        writeln!(
            out,
            "Period:    {} to {}",
            format_millis(document.window.start),
            format_millis(document.window.end)
        )?;
        writeln!(
            out,
            "Generated: {}",
            document.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(
            out,
            "Series: {}    Data points: {}    Failed: {}",
            document.totals.series, document.totals.data_points, document.totals.failed
        )
    }

    fn write_row(out: &mut String, row: &ReportRow) -> fmt::Result {
        let name = truncate(&row.display_name, NAME_WIDTH - 1);
        match &row.cells {
            RowCells::Stats {
                count,
                min,
                max,
                mean,
                sum,
            } => writeln!(
                out,
                "{:<w$}{:>6}{:>12.2}{:>12.2}{:>12.2}{:>12.2}  {}",
                name,
                count,
                min,
                max,
                mean,
                sum,
                row.key,
                w = NAME_WIDTH
            )?,
            RowCells::Failed { .. } => {
                let marker = row.error_marker().unwrap_or_default();
                writeln!(
                    out,
                    "{:<w$}{:<s$}  {}",
                    name,
                    marker,
                    row.key,
                    w = NAME_WIDTH,
                    s = STATS_WIDTH
                )?
            },
        }

        if let Some(profile) = &row.profile {
            let buckets: Vec<String> = profile
                .buckets
                .iter()
                .map(|b| format!("{} {:.2}", b.label, b.sum))
                .collect();
            writeln!(out, "    by {}: {}", profile.width.name(), buckets.join(" | "))?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

impl DocumentBackend for TextBackend {
    fn name(&self) -> &'static str {
        "text"
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }

    fn serialize(&self, document: &ReportDocument) -> Result<Bytes, RenderError> {
        let mut out = String::with_capacity(256 + document.row_count() * 96);
        Self::write_header(&mut out, document)?;

        let page_count = document.page_count();
        for (i, page) in document.pages.iter().enumerate() {
            if i > 0 {
                out.push('\u{000C}');
            }
            writeln!(out)?;
            writeln!(out, "Page {} of {}", page.number, page_count)?;
            writeln!(
                out,
                "{:<w$}{:>6}{:>12}{:>12}{:>12}{:>12}  KEY",
                "NAME",
                "COUNT",
                "MIN",
                "MAX",
                "MEAN",
                "SUM",
                w = NAME_WIDTH
            )?;
            if page.rows.is_empty() {
                writeln!(out, "(no series in window)")?;
            }
            for row in &page.rows {
                Self::write_row(&mut out, row)?;
            }
        }

        Ok(Bytes::from(out))
    }
}

/// JSON backend over serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBackend;

impl DocumentBackend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, document: &ReportDocument) -> Result<Bytes, RenderError> {
        serde_json::to_vec(document)
            .map(Bytes::from)
            .map_err(|e| RenderError::Serialization(e.to_string()))
    }
}
