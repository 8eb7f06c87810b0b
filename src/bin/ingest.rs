//! Fetches the IMF PCPS dataset into the local store.
//!
//! Run with: `cargo run --bin ingest -- --indicator-list indicators.txt`
//! Set `RUST_LOG=debug` for per-request logging.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use commodity_analytics::config::{init_tracing, AppConfig};
use commodity_analytics::ingest::write_indicator_list;
use commodity_analytics::{ClientConfig, Database, ImfClient, IngestionPipeline};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Fetch IMF commodity prices into SQLite")]
struct Args {
    /// SQLite database path (overrides COMMODITY_DB_PATH)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Delay after every request in milliseconds (overrides IMF_PACING_MS)
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Also write the active indicator list to this file
    #[arg(long, value_name = "FILE")]
    indicator_list: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        config.pacing_ms = pacing_ms;
    }

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let client = ImfClient::with_config(ClientConfig::from(&config))?;
    let structure_url = client.structure_url();

    let pipeline = IngestionPipeline::new(client, &db, config.pacing());
    let report = pipeline.run().await?;

    if let Some(path) = args.indicator_list {
        if report.active_indicators.is_empty() {
            tracing::warn!("No active indicators; not writing {}", path.display());
        } else {
            write_indicator_list(&path, &report.active_indicators, &structure_url, Utc::now())
                .with_context(|| format!("writing indicator list {}", path.display()))?;
            tracing::info!("Wrote {} indicators to {}", report.active_indicators.len(), path.display());
        }
    }

    println!("--- Session Summary ---");
    println!(
        "Configurations: {} attempted, {} failed, {} empty",
        report.configurations, report.failed_configurations, report.empty_configurations
    );
    println!(
        "Observations: {} inserted, {} updated, {} unchanged, {} failed writes, {} dropped rows",
        report.writes.inserted,
        report.writes.updated,
        report.writes.unchanged,
        report.writes.failed,
        report.dropped_rows
    );
    println!(
        "Indicators: {} new, {} reconfirmed, {} retired",
        report.registry.inserted,
        report.registry.reconfirmed,
        report.registry.retired.len()
    );
    Ok(())
}
