//! Server Configuration
//!
//! Locates and loads the configuration file for the binary.

use series_report::config::ApplicationConfig;
use std::path::{Path, PathBuf};

/// Load configuration from file or environment
///
/// Priority:
/// 1. `--config` flag
/// 2. REPORT_CONFIG environment variable
/// 3. report.toml
/// 4. Default configuration
///
/// Environment overrides are applied on top of whichever source wins.
pub fn load_config(cli_path: Option<&Path>) -> ApplicationConfig {
    let explicit: Option<PathBuf> = cli_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("REPORT_CONFIG").ok().map(PathBuf::from));

    let mut config = match explicit {
        Some(path) => match ApplicationConfig::load(&path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from: {}", path.display());
                config
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to load config from {}: {}. Trying defaults.",
                    path.display(),
                    e
                );
                load_local_or_default()
            },
        },
        None => load_local_or_default(),
    };

    config.apply_env_overrides();
    config
}

fn load_local_or_default() -> ApplicationConfig {
    let local = Path::new("report.toml");
    if local.exists() {
        match ApplicationConfig::load(local) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from report.toml");
                return config;
            },
            Err(e) => {
                eprintln!("[config] Failed to parse report.toml: {}. Using defaults.", e);
            },
        }
    }

    eprintln!("[config] Using default configuration");
    ApplicationConfig::default()
}
