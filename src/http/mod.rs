//! HTTP binding of the report operations
//!
//! # Endpoints
//!
//! ## Reports
//! - `POST /api/v1/reports/generate` - Generate a report, returned inline as JSON
//! - `GET /api/v1/reports/download` - Generate a report, returned as a file
//!
//! Report endpoints and `timeseries/all` accept a metric list (`metrics`
//! body field or comma-separated query parameter) restricting the series
//! covered.
//!
//! ## Time Series
//! - `POST /api/v1/timeseries` - Raw points of one series
//! - `GET /api/v1/timeseries/all` - Raw points of every series in a window
//!
//! ## Admin
//! - `GET /health` - Health check including store health
//! - `GET /api/v1/stats` - Request counters and store pool metrics

pub mod handlers;
pub mod types;

use crate::redis::RedisPool;
use crate::service::ReportService;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Request counters exposed on `/api/v1/stats`
#[derive(Debug, Default)]
pub struct RequestCounters {
    /// Reports returned successfully
    pub reports_generated: AtomicU64,
    /// Reports that failed
    pub reports_failed: AtomicU64,
    /// Single-series queries served
    pub series_queries: AtomicU64,
}

/// Shared application state
pub struct AppState {
    /// Report operations
    pub service: Arc<ReportService>,
    /// Store pool, when running over Redis
    pub pool: Option<Arc<RedisPool>>,
    /// CORS allowed origins (empty = any)
    pub cors_allowed_origins: Vec<String>,
    /// Request counters
    pub counters: RequestCounters,
}

impl AppState {
    /// State over a service with no pool and permissive CORS
    pub fn new(service: Arc<ReportService>) -> Self {
        Self {
            service,
            pool: None,
            cors_allowed_origins: Vec::new(),
            counters: RequestCounters::default(),
        }
    }

    /// Attach the Redis pool for stats and health
    pub fn with_pool(mut self, pool: Arc<RedisPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Restrict CORS origins
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }
}

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and stats
        .route("/health", get(handlers::health))
        .route("/api/v1/stats", get(handlers::get_stats))
        // Reports
        .route("/api/v1/reports/generate", post(handlers::generate_report))
        .route("/api/v1/reports/download", get(handlers::download_report))
        // Time series
        .route("/api/v1/timeseries", post(handlers::get_time_series))
        .route("/api/v1/timeseries/all", get(handlers::get_all_time_series))
        // State and CORS
        .with_state(state.clone())
        .layer(build_cors_layer(&state.cors_allowed_origins))
}
