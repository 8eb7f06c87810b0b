//! Indicator lifecycle tracking.
//!
//! Every refresh first marks all known indicators inactive, then re-activates
//! the ones present in the latest upstream listing. Codes that silently drop
//! out of the listing are detected without diffing snapshots, and their rows
//! stay in place so historical observations remain queryable.

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

const DESCRIPTION_PREFIX: &str = "Primary Commodity Prices, ";

/// One entry of an upstream indicator listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorInfo {
    pub code: String,
    pub description: String,
}

impl IndicatorInfo {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        IndicatorInfo {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Description without the dataset-wide "Primary Commodity Prices, "
    /// prefix, as shown in result files.
    pub fn short_description(&self) -> &str {
        self.description
            .strip_prefix(DESCRIPTION_PREFIX)
            .unwrap_or(&self.description)
    }
}

/// Stored lifecycle row of one indicator code.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorMetadata {
    pub code: String,
    pub description: String,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_active_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl IndicatorMetadata {
    pub fn info(&self) -> IndicatorInfo {
        IndicatorInfo::new(self.code.clone(), self.description.clone())
    }
}

/// What a refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Codes seen for the first time
    pub inserted: usize,
    /// Known codes confirmed active again
    pub reconfirmed: usize,
    /// Codes active before this refresh but absent from the listing
    pub retired: Vec<String>,
    /// Listing entries that could not be written
    pub failed: usize,
}

/// Access to the `indicators_metadata` table.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> IndicatorRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        IndicatorRegistry { conn }
    }

    /// Applies the latest upstream listing using the current time.
    pub fn refresh(&self, listing: &[IndicatorInfo]) -> Result<RefreshSummary, StoreError> {
        self.refresh_at(listing, Utc::now())
    }

    /// Applies the latest upstream listing in one transaction.
    ///
    /// A failure on a single listing entry is logged and counted; the rest of
    /// the listing is still applied.
    pub fn refresh_at(
        &self,
        listing: &[IndicatorInfo],
        now: DateTime<Utc>,
    ) -> Result<RefreshSummary, StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let previously_active: HashSet<String> = {
            let mut stmt = tx.prepare(
                "SELECT indicator_code FROM indicators_metadata WHERE is_currently_active = 1",
            )?;
            let codes = stmt.query_map([], |row| row.get::<_, String>(0))?;
            codes.collect::<Result<_, _>>()?
        };

        let marked = tx.execute("UPDATE indicators_metadata SET is_currently_active = 0", [])?;
        tracing::debug!(marked, "Marked existing indicators inactive");

        let mut summary = RefreshSummary::default();
        let mut listed = HashSet::new();
        for item in listing {
            match upsert_indicator(&tx, item, now) {
                Ok(true) => summary.inserted += 1,
                Ok(false) => summary.reconfirmed += 1,
                Err(e) => {
                    tracing::error!(code = %item.code, error = %e, "Failed to upsert indicator");
                    summary.failed += 1;
                    continue;
                }
            }
            listed.insert(item.code.as_str());
        }
        tx.commit()?;

        let mut retired: Vec<String> = previously_active
            .into_iter()
            .filter(|code| !listed.contains(code.as_str()))
            .collect();
        retired.sort();
        for code in &retired {
            tracing::warn!(code = %code, "Indicator no longer listed upstream, marked inactive");
        }
        summary.retired = retired;

        tracing::info!(
            inserted = summary.inserted,
            reconfirmed = summary.reconfirmed,
            retired = summary.retired.len(),
            "Indicator registry refreshed"
        );
        Ok(summary)
    }

    /// Looks up one indicator regardless of its active flag.
    pub fn get(&self, code: &str) -> Result<Option<IndicatorMetadata>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT indicator_code, description, first_seen_script_run,
                        last_seen_active_script_run, is_currently_active
                 FROM indicators_metadata WHERE indicator_code = ?1",
                [code],
                metadata_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Every indicator ever seen, ordered by code.
    pub fn all(&self) -> Result<Vec<IndicatorMetadata>, StoreError> {
        self.select("SELECT indicator_code, description, first_seen_script_run,
                            last_seen_active_script_run, is_currently_active
                     FROM indicators_metadata ORDER BY indicator_code")
    }

    /// Indicators present in the latest listing, ordered by code.
    pub fn active(&self) -> Result<Vec<IndicatorMetadata>, StoreError> {
        self.select("SELECT indicator_code, description, first_seen_script_run,
                            last_seen_active_script_run, is_currently_active
                     FROM indicators_metadata WHERE is_currently_active = 1
                     ORDER BY indicator_code")
    }

    fn select(&self, sql: &str) -> Result<Vec<IndicatorMetadata>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], metadata_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

/// Returns `true` when the code was inserted, `false` when it already existed.
fn upsert_indicator(
    conn: &Connection,
    item: &IndicatorInfo,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE indicators_metadata
         SET description = ?1, last_seen_active_script_run = ?2, is_currently_active = 1
         WHERE indicator_code = ?3",
        params![item.description, now, item.code],
    )?;
    if updated > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO indicators_metadata
         (indicator_code, description, first_seen_script_run,
          last_seen_active_script_run, is_currently_active)
         VALUES (?1, ?2, ?3, ?3, 1)",
        params![item.code, item.description, now],
    )?;
    Ok(true)
}

fn metadata_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndicatorMetadata> {
    Ok(IndicatorMetadata {
        code: row.get(0)?,
        description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        first_seen_at: row.get(2)?,
        last_seen_active_at: row.get(3)?,
        is_active: row.get::<_, i64>(4)? == 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use chrono::{Duration, TimeZone};

    fn listing(codes: &[&str]) -> Vec<IndicatorInfo> {
        codes
            .iter()
            .map(|code| IndicatorInfo::new(*code, format!("Primary Commodity Prices, {code}")))
            .collect()
    }

    #[test]
    fn first_refresh_inserts_everything_active() {
        let db = Database::open_in_memory().unwrap();
        let registry = db.registry();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let summary = registry.refresh_at(&listing(&["PGOLD", "POILWTI"]), now).unwrap();
        assert_eq!(summary.inserted, 2);
        assert!(summary.retired.is_empty());

        let gold = registry.get("PGOLD").unwrap().unwrap();
        assert!(gold.is_active);
        assert_eq!(gold.first_seen_at, Some(now));
        assert_eq!(gold.last_seen_active_at, Some(now));
    }

    #[test]
    fn second_refresh_retires_missing_codes_and_keeps_history() {
        let db = Database::open_in_memory().unwrap();
        let registry = db.registry();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let t2 = t1 + Duration::days(30);

        registry.refresh_at(&listing(&["PGOLD", "POILWTI", "PCOFFOTM"]), t1).unwrap();
        let summary = registry.refresh_at(&listing(&["PGOLD", "PWHEAMT"]), t2).unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.reconfirmed, 1);
        assert_eq!(summary.retired, vec!["PCOFFOTM".to_string(), "POILWTI".to_string()]);

        let gold = registry.get("PGOLD").unwrap().unwrap();
        assert!(gold.is_active);
        assert_eq!(gold.first_seen_at, Some(t1));
        assert_eq!(gold.last_seen_active_at, Some(t2));

        let oil = registry.get("POILWTI").unwrap().unwrap();
        assert!(!oil.is_active);
        assert_eq!(oil.last_seen_active_at, Some(t1));

        let wheat = registry.get("PWHEAMT").unwrap().unwrap();
        assert!(wheat.is_active);
        assert_eq!(wheat.first_seen_at, Some(t2));

        assert_eq!(registry.all().unwrap().len(), 4);
        let active: Vec<String> = registry.active().unwrap().into_iter().map(|m| m.code).collect();
        assert_eq!(active, vec!["PGOLD".to_string(), "PWHEAMT".to_string()]);
    }

    #[test]
    fn refresh_updates_description() {
        let db = Database::open_in_memory().unwrap();
        let registry = db.registry();
        registry.refresh(&[IndicatorInfo::new("PGOLD", "Gold")]).unwrap();
        registry
            .refresh(&[IndicatorInfo::new("PGOLD", "Gold, London fix")])
            .unwrap();
        assert_eq!(
            registry.get("PGOLD").unwrap().unwrap().description,
            "Gold, London fix"
        );
    }

    #[test]
    fn empty_listing_deactivates_without_deleting() {
        let db = Database::open_in_memory().unwrap();
        let registry = db.registry();
        registry.refresh(&listing(&["PGOLD"])).unwrap();
        let summary = registry.refresh(&[]).unwrap();
        assert_eq!(summary.retired, vec!["PGOLD".to_string()]);
        assert!(registry.active().unwrap().is_empty());
        assert!(registry.get("PGOLD").unwrap().is_some());
    }

    #[test]
    fn unknown_code_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.registry().get("NOPE").unwrap().is_none());
    }

    #[test]
    fn short_description_strips_dataset_prefix() {
        let info = IndicatorInfo::new("PGOLD", "Primary Commodity Prices, Gold");
        assert_eq!(info.short_description(), "Gold");
        let plain = IndicatorInfo::new("PGOLD", "Gold");
        assert_eq!(plain.short_description(), "Gold");
    }
}
