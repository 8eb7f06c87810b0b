//! Rolling-window correlation of one indicator pair.
//!
//! Run with: `cargo run --bin rolling-correlation -- --first PGOLD --second PSILVER`

use anyhow::{Context, Result};
use clap::Parser;
use commodity_analytics::analysis::{checked_window_length, resolve_pair, DEFAULT_ROLLING_WINDOW};
use commodity_analytics::config::{init_tracing, AppConfig};
use commodity_analytics::sink::write_unranked;
use commodity_analytics::{CsvResultSink, Database, Frequency, RollingPairAnalysis};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rolling-correlation", about = "Rolling correlation of two indicators")]
struct Args {
    /// SQLite database path (overrides COMMODITY_DB_PATH)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// First indicator code
    #[arg(long)]
    first: String,

    /// Second indicator code
    #[arg(long)]
    second: String,

    /// Window length in months (at least 2)
    #[arg(long, default_value_t = DEFAULT_ROLLING_WINDOW)]
    window: usize,

    /// Output CSV path
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let window = checked_window_length(args.window, 2).context("--window")?;
    let first = args.first.trim().to_uppercase();
    let second = args.second.trim().to_uppercase();

    let mut config = AppConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    let (a, b) = resolve_pair(&db.registry(), &first, &second)?;
    let analysis = RollingPairAnalysis::new(window, Frequency::Monthly);
    let report = analysis.run(&db, &a, &b)?;

    if report.windows.is_empty() {
        println!(
            "{} and {} share {} months; a {}-month window needs at least that many.",
            a.code,
            b.code,
            report.common_periods,
            analysis.window_length()
        );
        return Ok(());
    }

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "correlation_{}_{}_{}m_rolling.csv",
            a.code,
            b.code,
            analysis.window_length()
        ))
    });
    let mut sink = CsvResultSink::create(&output)
        .with_context(|| format!("creating {}", output.display()))?;
    let written = write_unranked(&mut sink, &report.windows)?;

    println!(
        "{} windows ({} undefined) written to {}",
        written,
        report.undefined,
        output.display()
    );
    Ok(())
}
