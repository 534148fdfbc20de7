//! Report rendering
//!
//! ```text
//! Vec<SeriesSummary> ──ReportRenderer::render──► ReportDocument ──DocumentBackend::serialize──► Bytes
//! ```
//!
//! The renderer only paginates and formats rows; byte layout belongs to the
//! backend, so new output formats never touch the pagination logic.

pub mod backend;
pub mod document;
pub mod renderer;

pub use backend::{DocumentBackend, JsonBackend, ReportFormat, TextBackend};
pub use document::{Page, ReportDocument, ReportRow, ReportTotals, RowCells, ROWS_PER_PAGE};
pub use renderer::{ReportRenderer, DEFAULT_TITLE};
