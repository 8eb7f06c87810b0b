//! Run configuration shared by the binaries.

use crate::imf_client::DEFAULT_BASE_URL;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const ENV_DB_PATH: &str = "COMMODITY_DB_PATH";
pub const ENV_BASE_URL: &str = "IMF_BASE_URL";
pub const ENV_PACING_MS: &str = "IMF_PACING_MS";
pub const ENV_TIMEOUT_SECS: &str = "IMF_TIMEOUT_SECS";

/// Settings for ingestion and analysis runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the SQLite database (default: "database/imf_commodities.sqlite")
    pub db_path: PathBuf,
    /// SDMX-JSON service root
    pub base_url: String,
    /// Delay after every remote request, in milliseconds (default: 1000)
    pub pacing_ms: u64,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("database/imf_commodities.sqlite"),
            base_url: DEFAULT_BASE_URL.to_string(),
            pacing_ms: 1000,
            timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by any of the `COMMODITY_*` / `IMF_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable lookup.
    /// Unparseable numbers keep the default and log a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url;
        }
        config.pacing_ms = parse_or(&lookup, ENV_PACING_MS, config.pacing_ms);
        config.timeout_seconds = parse_or(&lookup, ENV_TIMEOUT_SECS, config.timeout_seconds);
        config
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

fn parse_or<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring {}={:?}: not a whole number, using {}", name, raw, default);
            default
        }),
        None => default,
    }
}

/// Installs the fmt subscriber. `RUST_LOG` controls the filter, default `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
