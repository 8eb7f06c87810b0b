use crate::loader::decode_rows;
use crate::period::Period;
use crate::registry::IndicatorRegistry;
use crate::series_key::{Frequency, SeriesKey};
use crate::time_series::{
    Observation, ObservationSource, RawObservation, SeriesPoint, StoredValue,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Errors raised by the SQLite layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error preparing database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to store non-finite value for {series_key} at {period}")]
    NonFiniteValue { series_key: String, period: Period },
}

/// Result of writing one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No row existed for (series key, date)
    Inserted,
    /// A row existed with a different value; value and provenance replaced
    UpdatedValue,
    /// A row existed with the same value; nothing written
    UnchangedSkipped,
}

/// Per-outcome counts of a batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl UpsertSummary {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::UpdatedValue => self.updated += 1,
            WriteOutcome::UnchangedSkipped => self.unchanged += 1,
        }
    }

    /// Inserts plus value-changing updates.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn absorb(&mut self, other: &UpsertSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// SQLite database holding observations and indicator metadata.
///
/// Creates the schema on open. Opening is the one storage failure that is
/// fatal: callers should stop before doing any work when it fails.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) a file-based database, creating the parent
    /// directory when it does not exist yet.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::info!("Created database directory {}", parent.display());
            }
        }
        let conn = Connection::open(db_path)?;
        let db = Database { conn };
        db.ensure_schema()?;
        log::info!("Database initialized at {}", db_path.display());
        Ok(db)
    }

    /// Opens an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.ensure_schema()?;
        Ok(db)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS commodity_prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                frequency_code TEXT NOT NULL,
                area_code TEXT NOT NULL,
                indicator_code TEXT NOT NULL,
                unit_code TEXT NOT NULL,
                observation_date TEXT NOT NULL,
                observation_value REAL,
                data_series_key TEXT NOT NULL,
                last_fetched_script TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (data_series_key, observation_date)
            );
            CREATE INDEX IF NOT EXISTS idx_commodity_prices_indicator
                ON commodity_prices(indicator_code, frequency_code);
            CREATE TABLE IF NOT EXISTS indicators_metadata (
                indicator_code TEXT PRIMARY KEY,
                description TEXT,
                first_seen_script_run TIMESTAMP,
                last_seen_active_script_run TIMESTAMP,
                is_currently_active INTEGER DEFAULT 0 CHECK(is_currently_active IN (0,1))
            );",
        )?;
        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        Ok(stmt.exists([table_name])?)
    }

    /// Observation table access.
    pub fn series_store(&self) -> SeriesStore<'_> {
        SeriesStore { conn: &self.conn }
    }

    /// Indicator metadata table access.
    pub fn registry(&self) -> IndicatorRegistry<'_> {
        IndicatorRegistry::new(&self.conn)
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Observation table with idempotent upsert and change detection.
#[derive(Debug, Clone, Copy)]
pub struct SeriesStore<'a> {
    conn: &'a Connection,
}

impl<'a> SeriesStore<'a> {
    /// Writes one observation, stamping provenance with the current time.
    pub fn upsert(&self, observation: &Observation) -> Result<WriteOutcome, StoreError> {
        self.upsert_at(observation, Utc::now())
    }

    /// Writes one observation inside its own transaction.
    ///
    /// An existing row with an equal value is left untouched, including its
    /// provenance timestamp.
    pub fn upsert_at(
        &self,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, StoreError> {
        let key = &observation.key;
        let series_key = key.as_string();
        if !observation.value.is_finite() {
            return Err(StoreError::NonFiniteValue {
                series_key,
                period: observation.period,
            });
        }
        let date = observation.period.to_string();

        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<Value> = tx
            .query_row(
                "SELECT observation_value FROM commodity_prices
                 WHERE data_series_key = ?1 AND observation_date = ?2",
                params![series_key, date],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing.map(stored_value) {
            None => {
                tx.execute(
                    "INSERT INTO commodity_prices
                     (frequency_code, area_code, indicator_code, unit_code,
                      observation_date, observation_value, data_series_key, last_fetched_script)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        key.frequency().code(),
                        key.area(),
                        key.indicator(),
                        key.unit(),
                        date,
                        observation.value,
                        series_key,
                        now,
                    ],
                )?;
                WriteOutcome::Inserted
            }
            Some(stored) if stored.as_f64() == Some(observation.value) => {
                WriteOutcome::UnchangedSkipped
            }
            Some(_) => {
                tx.execute(
                    "UPDATE commodity_prices
                     SET observation_value = ?1, last_fetched_script = ?2
                     WHERE data_series_key = ?3 AND observation_date = ?4",
                    params![observation.value, now, series_key, date],
                )?;
                WriteOutcome::UpdatedValue
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Writes every point of one series.
    ///
    /// A failure on one observation is logged and counted; the remaining
    /// points are still written.
    pub fn upsert_batch(&self, key: &SeriesKey, points: &[SeriesPoint]) -> UpsertSummary {
        let mut summary = UpsertSummary::default();
        if points.is_empty() {
            log::info!("No data to save for series {}", key);
            return summary;
        }

        let now = Utc::now();
        for point in points {
            let observation = Observation::new(key.clone(), point.period, point.value);
            match self.upsert_at(&observation, now) {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    log::error!("Failed to save {} for date {}: {}", key, point.period, e);
                    summary.failed += 1;
                }
            }
        }

        if summary.written() > 0 {
            log::info!(
                "Series {}: {} inserted, {} updated, {} unchanged",
                key,
                summary.inserted,
                summary.updated,
                summary.unchanged
            );
        } else {
            log::info!("No new or changed records for series {}", key);
        }
        summary
    }

    /// Returns the decoded points of one series, ascending by period.
    ///
    /// Rows with an unreadable period or value are dropped with a warning.
    pub fn query(&self, key: &SeriesKey) -> Result<Vec<SeriesPoint>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT observation_date, observation_value FROM commodity_prices
             WHERE data_series_key = ?1
             ORDER BY observation_date, id",
        )?;
        let rows = stmt.query_map([key.as_string()], |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?))
        })?;
        let raw = collect_raw(rows, &key.as_string())?;
        Ok(decode_rows(&key.as_string(), key.frequency(), raw).points)
    }

    /// Returns the provenance timestamp of one stored observation.
    pub fn provenance(
        &self,
        key: &SeriesKey,
        period: Period,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let stamp = self
            .conn
            .query_row(
                "SELECT last_fetched_script FROM commodity_prices
                 WHERE data_series_key = ?1 AND observation_date = ?2",
                params![key.as_string(), period.to_string()],
                |row| row.get::<_, Option<DateTime<Utc>>>(0),
            )
            .optional()?;
        Ok(stamp.flatten())
    }

    /// Total number of stored observations.
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commodity_prices", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ObservationSource for SeriesStore<'_> {
    fn observations(
        &self,
        indicator: &str,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT observation_date, observation_value FROM commodity_prices
             WHERE indicator_code = ?1 AND frequency_code = ?2
             ORDER BY observation_date, id",
        )?;
        let rows = stmt.query_map(params![indicator, frequency.code()], |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?))
        })?;
        collect_raw(rows, indicator)
    }
}

impl ObservationSource for Database {
    fn observations(
        &self,
        indicator: &str,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, StoreError> {
        self.series_store().observations(indicator, frequency)
    }
}

fn collect_raw<I>(rows: I, label: &str) -> Result<Vec<RawObservation>, StoreError>
where
    I: Iterator<Item = rusqlite::Result<(Value, Value)>>,
{
    let mut raw = Vec::new();
    for row in rows {
        let (date, value) = row?;
        match date_text(date) {
            Some(date) => raw.push(RawObservation::new(date, stored_value(value))),
            None => log::warn!("Dropping {} row with a missing observation date", label),
        }
    }
    Ok(raw)
}

fn stored_value(value: Value) -> StoredValue {
    match value {
        Value::Real(v) => StoredValue::Real(v),
        Value::Integer(v) => StoredValue::Integer(v),
        Value::Text(s) => StoredValue::Text(s),
        Value::Null | Value::Blob(_) => StoredValue::Null,
    }
}

fn date_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        Value::Integer(v) => Some(v.to_string()),
        Value::Real(v) => Some(v.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}
