//! Series Report HTTP Server
//!
//! This binary serves the report operations over HTTP and can also produce a
//! report offline from the command line.
//!
//! # Endpoints
//!
//! - `POST /api/v1/reports/generate` - Generate a report (JSON)
//! - `GET /api/v1/reports/download` - Generate a report (file download)
//! - `POST /api/v1/timeseries` - Raw points of one series
//! - `GET /api/v1/timeseries/all` - Raw points of every series in a window
//! - `GET /health` - Health check
//! - `GET /api/v1/stats` - Request counters and store pool metrics
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration
//! - `report` - Generate one report and write it to a file
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` flag
//! 2. `REPORT_CONFIG` environment variable (path to TOML file)
//! 3. `./report.toml` in current directory
//! 4. Default configuration

mod config;

use clap::{Parser, Subcommand};
use series_report::{
    config::ApplicationConfig,
    http::{build_router, AppState},
    redis::{util::sanitize_url, RedisPool, RedisTimeSeriesGateway},
    report::ReportFormat,
    service::{ReportService, SeriesFilter},
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::signal;
use tracing::{debug, info, warn};

// =============================================================================
// Server Setup
// =============================================================================

/// Graceful shutdown signal handler
///
/// Signal registration failures are logged and the handler waits forever
/// instead of panicking during startup.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Connect to Redis and assemble the report service
async fn init_service(
    app_config: &ApplicationConfig,
    format: ReportFormat,
) -> Result<(Arc<ReportService>, Arc<RedisPool>), Box<dyn std::error::Error>> {
    debug!("Connecting to Redis at {}...", sanitize_url(&app_config.redis.url));

    let pool = Arc::new(RedisPool::new(app_config.redis_config()).await?);
    debug!("Connected to Redis successfully");

    let gateway = RedisTimeSeriesGateway::new(Arc::clone(&pool))
        .with_scan_count(app_config.redis.scan_count);

    let service = ReportService::new(Arc::new(gateway), app_config.service_config())
        .with_backend(format.backend());

    Ok((Arc::new(service), pool))
}

// =============================================================================
// CLI Definition
// =============================================================================

/// Series Report - summary reports over RedisTimeSeries
#[derive(Parser)]
#[command(name = "report-server")]
#[command(version)]
#[command(about = "Summary reports over RedisTimeSeries analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides REPORT_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration without starting the server
    CheckConfig,

    /// Generate one report and write it to a file
    Report {
        /// Window start, milliseconds since epoch (default: 7 days before end)
        #[arg(long)]
        start: Option<i64>,

        /// Window end, milliseconds since epoch (default: now)
        #[arg(long)]
        end: Option<i64>,

        /// Output path (default: report-<generated ms>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (text, json); overrides the configured format
        #[arg(short, long)]
        format: Option<ReportFormat>,

        /// Only report this metric (repeatable; default: every series)
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
    },
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(app_config: &ApplicationConfig) -> Result<(), Box<dyn std::error::Error>> {
    app_config.validate()?;

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", app_config.server.listen_addr);
    println!("  Log level: {}", app_config.server.log_level);
    println!();
    println!("Redis Settings:");
    println!("  URL: {}", sanitize_url(&app_config.redis.url));
    println!("  Pool size: {}", app_config.redis.pool_size);
    println!("  TLS: {}", app_config.redis.tls_enabled);
    println!();
    println!("Report Settings:");
    println!("  Title: {}", app_config.report.title);
    println!("  Key prefix: {}", app_config.report.key_prefix);
    println!(
        "  Max concurrent fetches: {}",
        app_config.report.max_concurrent_fetches
    );
    println!(
        "  Default window: {} days",
        app_config.report.default_window_days
    );
    println!("  Format: {}", app_config.report.format);

    Ok(())
}

/// Generate a report offline
async fn cmd_report(
    app_config: &ApplicationConfig,
    start: Option<i64>,
    end: Option<i64>,
    output: Option<PathBuf>,
    format: Option<ReportFormat>,
    metrics: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    app_config.validate()?;
    let format = match format {
        Some(format) => format,
        None => app_config.report_format()?,
    };

    let (service, _pool) = init_service(app_config, format).await?;
    let window = service.resolve_window(start, end);
    let report = service
        .generate_filtered_report(window, &SeriesFilter::metrics(metrics))
        .await?;

    let path = output.unwrap_or_else(|| PathBuf::from(report.file_name()));
    tokio::fs::write(&path, &report.bytes).await?;

    println!("Report written to {}", path.display());
    println!("  Pages: {}", report.page_count);
    println!("  Series: {}", report.totals.series);
    println!("  Data points: {}", report.totals.data_points);
    println!("  Failed series: {}", report.totals.failed);
    println!("  Generated at: {}", report.generated_at_rfc3339());

    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut app_config = config::load_config(cli.config.as_deref());
    if let Some(listen) = &cli.listen {
        app_config.server.listen_addr = listen.clone();
    }

    init_tracing(&app_config.server.log_level);

    // Route to appropriate command handler
    match cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&app_config),
        Some(Commands::Report {
            start,
            end,
            output,
            format,
            metrics,
        }) => return cmd_report(&app_config, start, end, output, format, metrics).await,
        Some(Commands::Start) | None => {
            // Continue with server startup below
        },
    }

    app_config.validate()?;

    info!("Starting Series Report Server v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        listen_addr = %app_config.server.listen_addr,
        key_prefix = %app_config.report.key_prefix,
        max_concurrent_fetches = app_config.report.max_concurrent_fetches,
        "Configuration"
    );

    let (service, pool) = init_service(&app_config, app_config.report_format()?).await?;

    let state = Arc::new(
        AppState::new(service)
            .with_pool(pool)
            .with_cors_origins(app_config.server.cors_allowed_origins.clone()),
    );
    let app = build_router(state);

    let addr: SocketAddr = app_config.server.listen_addr.parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
