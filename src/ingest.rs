//! Ingestion: structure fetch, registry refresh, series planning, fetch and
//! upsert, one configuration at a time.

use crate::imf_client::{SdmxSource, SourceError};
use crate::period::Period;
use crate::registry::{IndicatorInfo, RefreshSummary};
use crate::sdmx::{DataStructure, ObservationRow};
use crate::series_key::{Frequency, SeriesKey};
use crate::store::{Database, StoreError, UpsertSummary};
use crate::time_series::SeriesPoint;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub const DEFAULT_AREA: &str = "W00";
pub const PRICE_UNIT: &str = "USD";
pub const INDEX_UNIT: &str = "IX";

/// Aggregate indices whose codes and descriptions do not reveal they are
/// indices.
const INDEX_AGGREGATES: [&str; 8] = [
    "PALLFNF", "PALLMETA", "PRAWM", "PBEVE", "PCERE", "PFOOD", "PNFUEL", "PPMETA",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not fetch the dataset structure: {0}")]
    Structure(#[source] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether an indicator is published as an index rather than a price.
pub fn is_index_indicator(info: &IndicatorInfo) -> bool {
    info.description.to_lowercase().contains("index")
        || info.code.ends_with("IX")
        || INDEX_AGGREGATES.contains(&info.code.as_str())
}

/// Series configurations to fetch, in fetch order: indicator listing order,
/// then frequency order within each indicator.
pub fn plan(structure: &DataStructure) -> Vec<SeriesKey> {
    let mut frequencies: Vec<Frequency> = structure
        .frequencies
        .iter()
        .filter_map(|entry| Frequency::from_code(&entry.code).ok())
        .collect();
    if frequencies.is_empty() {
        warn!("Neither M nor A listed upstream; using both");
        frequencies = vec![Frequency::Monthly, Frequency::Annual];
    }

    let area = structure
        .areas
        .first()
        .map(|entry| entry.code.as_str())
        .unwrap_or(DEFAULT_AREA);

    for unit in [PRICE_UNIT, INDEX_UNIT] {
        if !structure.has_unit(unit) {
            warn!(unit, "Unit not listed upstream; using it anyway");
        }
    }

    let mut keys = Vec::new();
    for info in structure.indicator_listing() {
        let unit = if is_index_indicator(&info) {
            INDEX_UNIT
        } else {
            PRICE_UNIT
        };
        for &frequency in &frequencies {
            match SeriesKey::new(frequency, area, info.code.as_str(), unit) {
                Ok(key) => keys.push(key),
                Err(e) => warn!(code = %info.code, error = %e, "Skipping unusable indicator code"),
            }
        }
    }
    keys
}

/// Parses fetched rows into points. Returns the points and the number of
/// rows dropped for an unreadable period or value.
pub fn parse_rows(rows: &[ObservationRow], frequency: Frequency) -> (Vec<SeriesPoint>, usize) {
    let mut points = Vec::with_capacity(rows.len());
    let mut dropped = 0;
    for row in rows {
        let period = match Period::parse(&row.time_period, frequency) {
            Ok(period) => period,
            Err(e) => {
                warn!(period = %row.time_period, error = %e, "Dropping row with unparseable period");
                dropped += 1;
                continue;
            }
        };
        match row.value.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => points.push(SeriesPoint::new(period, value)),
            _ => {
                warn!(period = %period, value = %row.value, "Dropping row with non-numeric value");
                dropped += 1;
            }
        }
    }
    (points, dropped)
}

/// Totals of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub registry: RefreshSummary,
    /// Series configurations attempted
    pub configurations: usize,
    /// Configurations skipped after a transport or decode error
    pub failed_configurations: usize,
    /// Configurations for which the source returned no observations
    pub empty_configurations: usize,
    pub writes: UpsertSummary,
    /// Fetched rows that could not be parsed
    pub dropped_rows: usize,
    /// Active indicators at the end of the run
    pub active_indicators: Vec<IndicatorInfo>,
}

/// Sequential fetch-and-store pipeline over an [`SdmxSource`].
pub struct IngestionPipeline<'a, S: SdmxSource> {
    source: S,
    db: &'a Database,
    pacing: Duration,
}

impl<'a, S: SdmxSource> IngestionPipeline<'a, S> {
    pub fn new(source: S, db: &'a Database, pacing: Duration) -> Self {
        IngestionPipeline { source, db, pacing }
    }

    /// Runs one full ingestion.
    ///
    /// Only a failed structure fetch or a failed registry write aborts the
    /// run. Every per-series failure is logged and skipped.
    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        let structure = self
            .source
            .data_structure()
            .await
            .map_err(IngestError::Structure)?;
        self.pace().await;

        let mut report = IngestReport::default();
        let listing = structure.indicator_listing();
        if listing.is_empty() {
            warn!("Indicator code list is empty; leaving the registry untouched");
        } else {
            report.registry = self.db.registry().refresh(&listing)?;
        }

        let keys = plan(&structure);
        info!(
            indicators = listing.len(),
            configurations = keys.len(),
            "Planned series configurations"
        );

        let store = self.db.series_store();
        for (i, key) in keys.iter().enumerate() {
            report.configurations += 1;
            info!("({}/{}) Fetching {}", i + 1, keys.len(), key);
            let fetched = self.source.compact_data(key).await;
            self.pace().await;

            let series = match fetched {
                Ok(series) => series,
                Err(e) => {
                    error!(series = %key, error = %e, "Skipping series configuration");
                    report.failed_configurations += 1;
                    continue;
                }
            };
            let with_rows = series.iter().filter(|s| !s.rows.is_empty()).count();
            if with_rows > 1 {
                warn!(
                    series = %key,
                    count = with_rows,
                    "Several series returned; using the first with observations"
                );
            }
            let rows = series
                .into_iter()
                .find(|s| !s.rows.is_empty())
                .map(|s| s.rows)
                .unwrap_or_default();
            if rows.is_empty() {
                info!(series = %key, "No observations returned");
                report.empty_configurations += 1;
                continue;
            }

            let (points, dropped) = parse_rows(&rows, key.frequency());
            report.dropped_rows += dropped;
            let summary = store.upsert_batch(key, &points);
            report.writes.absorb(&summary);
        }

        report.active_indicators = self
            .db
            .registry()
            .active()?
            .iter()
            .map(|row| row.info())
            .collect();

        info!(
            configurations = report.configurations,
            failed = report.failed_configurations,
            inserted = report.writes.inserted,
            updated = report.writes.updated,
            unchanged = report.writes.unchanged,
            failed_writes = report.writes.failed,
            dropped_rows = report.dropped_rows,
            "Ingestion complete"
        );
        Ok(report)
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

/// Writes the human-readable `code | description` list of indicators.
pub fn write_indicator_list(
    path: &Path,
    indicators: &[IndicatorInfo],
    source_url: &str,
    generated_at: DateTime<Utc>,
) -> io::Result<()> {
    let rule = "-".repeat(70);
    let mut out = io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "---- Currently Active Commodity Indicators (IMF PCPS) ----")?;
    writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "Source: {source_url}")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{:<18} | Description", "Indicator Code")?;
    writeln!(out, "{rule}")?;
    for indicator in indicators {
        writeln!(out, "{:<18} | {}", indicator.code, indicator.description)?;
    }
    out.flush()
}
