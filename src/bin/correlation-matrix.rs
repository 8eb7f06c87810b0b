//! Ranks every pair of stored indicators by Pearson correlation.
//!
//! Run with: `cargo run --bin correlation-matrix -- --months 120`

use anyhow::{bail, Context, Result};
use clap::Parser;
use commodity_analytics::analysis::{checked_window_length, indicator_universe};
use commodity_analytics::config::{init_tracing, AppConfig};
use commodity_analytics::sink::write_ranked;
use commodity_analytics::{
    CorrelationMatrix, CsvResultSink, Database, Frequency, MatrixConfig, WindowSpec,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "correlation-matrix", about = "Rank all indicator pairs by correlation")]
struct Args {
    /// SQLite database path (overrides COMMODITY_DB_PATH)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Correlate over the latest N months of each pair
    #[arg(long, conflicts_with = "max")]
    months: Option<usize>,

    /// Correlate over the full common history of each pair
    #[arg(long)]
    max: bool,

    /// Minimum aligned months for a pair to be scored
    #[arg(long)]
    min_samples: Option<usize>,

    /// Include indicators no longer listed upstream
    #[arg(long)]
    include_inactive: bool,

    /// Keep zero-variance pairs, unranked, after the ranked rows
    #[arg(long)]
    keep_undefined: bool,

    /// Output CSV path
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let window = match (args.months, args.max) {
        (Some(months), false) => {
            WindowSpec::latest(checked_window_length(months, 1).context("--months")?)
        }
        (None, true) => WindowSpec::FullHistory,
        _ => bail!("choose a window with --months <N> or --max"),
    };
    let output = args.output.unwrap_or_else(|| match window.nominal_length() {
        Some(months) => PathBuf::from(format!("correlation_matrix_{months}m.csv")),
        None => PathBuf::from("correlation_matrix_max.csv"),
    });

    let mut config = AppConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    let universe = indicator_universe(&db.registry(), args.include_inactive)?;
    if universe.len() < 2 {
        println!("Found {} indicators; need at least two to correlate.", universe.len());
        return Ok(());
    }

    let matrix = CorrelationMatrix::new(MatrixConfig {
        window,
        min_samples: args.min_samples,
        frequency: Frequency::Monthly,
        exclude_undefined: !args.keep_undefined,
    });
    let report = matrix.run(&db, &universe)?;

    let mut sink = CsvResultSink::create(&output)
        .with_context(|| format!("creating {}", output.display()))?;
    let written = write_ranked(&mut sink, &report.ranked)?;

    println!("--- Analysis Complete ---");
    println!(
        "Pairs: {} total, {} scored, {} undefined, {} below {} samples, {} without overlap",
        report.pairs_total,
        report.scored,
        report.undefined,
        report.insufficient,
        matrix.config().effective_min_samples(),
        report.no_overlap
    );
    println!("{} rows written to {}", written, output.display());
    Ok(())
}
