//! HTTP handlers for the report API

use super::types::*;
use super::AppState;
use crate::error::{GatewayError, ReportError};
use crate::gateway::HealthStatus;
use crate::service::SeriesFilter;
use crate::types::SeriesKey;
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

// =============================================================================
// Error Mapping
// =============================================================================

/// Failure of an API call, rendered as `{success: false, error}`
#[derive(Debug)]
pub enum ApiError {
    /// Malformed input
    BadRequest(String),
    /// Single-series query failed
    Gateway(GatewayError),
    /// Report generation failed
    Report(ReportError),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Gateway(GatewayError::QueryFailed { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Report(ReportError::GenerationFailed(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Report(ReportError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Report(ReportError::Render(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError::Gateway(e)
    }
}

impl From<ReportError> for ApiError {
    fn from(e: ReportError) -> Self {
        ApiError::Report(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Gateway(e) => e.to_string(),
            ApiError::Report(e) => e.to_string(),
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

// =============================================================================
// Health & Stats Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.service.gateway().health_check().await;
    let (code, status) = match store {
        HealthStatus::Unhealthy => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        HealthStatus::Degraded => (StatusCode::OK, "degraded"),
        HealthStatus::Healthy | HealthStatus::Unknown => (StatusCode::OK, "healthy"),
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            store,
        }),
    )
}

/// Service and store statistics
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        gateway: state.service.gateway().gateway_id().to_string(),
        reports_generated: state.counters.reports_generated.load(Ordering::Relaxed),
        reports_failed: state.counters.reports_failed.load(Ordering::Relaxed),
        series_queries: state.counters.series_queries.load(Ordering::Relaxed),
        pool: state.pool.as_ref().map(|pool| pool.metrics()),
    })
}

// =============================================================================
// Report Handlers
// =============================================================================

async fn run_report(
    state: &AppState,
    start: Option<i64>,
    end: Option<i64>,
    metrics: &[String],
) -> Result<crate::service::GeneratedReport, ApiError> {
    let window = state.service.resolve_window(start, end);
    let filter = SeriesFilter::metrics(metrics);
    match state.service.generate_filtered_report(window, &filter).await {
        Ok(report) => {
            state.counters.reports_generated.fetch_add(1, Ordering::Relaxed);
            Ok(report)
        },
        Err(e) => {
            state.counters.reports_failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Report generation failed");
            Err(e.into())
        },
    }
}

/// Generate a report and return it inline as JSON
pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateReportRequest>,
) -> Result<Json<GenerateReportResponse>, ApiError> {
    let report = run_report(&state, req.start_timestamp, req.end_timestamp, &req.metrics).await?;

    Ok(Json(GenerateReportResponse {
        generated_at: report.generated_at_rfc3339(),
        page_count: report.page_count,
        pdf_data: report.bytes.to_vec(),
    }))
}

/// Generate a report and return the raw document as an attachment
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Response, ApiError> {
    let report = run_report(&state, params.start, params.end, &params.metric_list()).await?;

    let headers = [
        (header::CONTENT_TYPE, report.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", report.file_name()),
        ),
        (
            HeaderName::from_static("x-page-count"),
            report.page_count.to_string(),
        ),
        (
            HeaderName::from_static("x-generated-at"),
            report.generated_at_rfc3339(),
        ),
    ];

    Ok((headers, report.bytes).into_response())
}

// =============================================================================
// Time Series Handlers
// =============================================================================

/// Fetch the raw points of one series
pub async fn get_time_series(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TimeSeriesRequest>,
) -> Result<Json<TimeSeriesResponse>, ApiError> {
    if req.key.trim().is_empty() {
        return Err(ApiError::BadRequest("Series key cannot be empty".to_string()));
    }

    state.counters.series_queries.fetch_add(1, Ordering::Relaxed);
    let window = state
        .service
        .resolve_window(req.start_timestamp, req.end_timestamp);
    let key = SeriesKey::new(req.key);
    let data_points = state.service.get_time_series_data(&key, window).await?;

    Ok(Json(TimeSeriesResponse {
        key: key.to_string(),
        data_points,
    }))
}

/// Fetch the raw points of every selected series
pub async fn get_all_time_series(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<AllSeriesResponse>, ApiError> {
    state.counters.series_queries.fetch_add(1, Ordering::Relaxed);
    let window = state.service.resolve_window(params.start, params.end);
    let filter = SeriesFilter::metrics(params.metric_list());
    let summaries = state.service.get_all_time_series_data(window, &filter).await?;

    let mut data = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for summary in summaries {
        let key = summary.key.to_string();
        if let Some(e) = &summary.fetch_error {
            errors.insert(key.clone(), e.to_string());
        }
        let points = summary.sampled.into_iter().map(DatedPoint::from).collect();
        data.insert(key, points);
    }

    Ok(Json(AllSeriesResponse {
        success: true,
        data,
        errors,
    }))
}
