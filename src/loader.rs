//! Reconstructs typed series from stored rows.

use crate::period::Period;
use crate::series_key::Frequency;
use crate::store::StoreError;
use crate::time_series::{ObservationSource, RawObservation, Series, SeriesPoint};
use tracing::{debug, warn};

/// Stored rows decoded into points, plus what had to be dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRows {
    /// Points sorted ascending by period, one per period
    pub points: Vec<SeriesPoint>,
    /// Rows whose period failed both the strict and the lenient parser
    pub bad_periods: usize,
    /// Rows whose value is missing or not a finite number
    pub bad_values: usize,
    /// Rows that collided with an earlier row on the same period
    pub duplicates: usize,
}

/// Decodes raw rows: strict period parse, lenient retry, numeric value
/// check. Unreadable rows are dropped with a warning, never fatal.
pub fn decode_rows(label: &str, frequency: Frequency, rows: Vec<RawObservation>) -> DecodedRows {
    let mut decoded = DecodedRows::default();
    let mut lenient = 0usize;

    for row in rows {
        let period = match Period::parse_strict(&row.date, frequency) {
            Ok(period) => period,
            Err(_) => match Period::parse_lenient(&row.date, frequency) {
                Ok(period) => {
                    lenient += 1;
                    period
                }
                Err(e) => {
                    warn!(series = label, error = %e, "Dropping row with unparseable period");
                    decoded.bad_periods += 1;
                    continue;
                }
            },
        };

        match row.value.as_f64() {
            Some(value) => decoded.points.push(SeriesPoint::new(period, value)),
            None => {
                warn!(
                    series = label,
                    period = %period,
                    value = ?row.value,
                    "Dropping row with non-numeric value"
                );
                decoded.bad_values += 1;
            }
        }
    }

    if lenient > 0 {
        debug!(series = label, lenient, "Recovered periods with the lenient parser");
    }

    decoded.points.sort_by_key(|point| point.period);
    let before = decoded.points.len();
    decoded.points.dedup_by_key(|point| point.period);
    decoded.duplicates = before - decoded.points.len();
    if decoded.duplicates > 0 {
        warn!(
            series = label,
            duplicates = decoded.duplicates,
            "Multiple rows share a period; keeping the first"
        );
    }

    decoded
}

/// Loads one indicator's series from an observation source.
#[derive(Debug, Clone, Copy)]
pub struct SeriesLoader<'s, S: ObservationSource> {
    source: &'s S,
}

impl<'s, S: ObservationSource> SeriesLoader<'s, S> {
    pub fn new(source: &'s S) -> Self {
        SeriesLoader { source }
    }

    /// Returns the decoded series of `indicator` at `frequency`.
    ///
    /// An indicator with no stored rows yields an empty series, which callers
    /// treat as "no data" rather than a failure.
    pub fn load(&self, indicator: &str, frequency: Frequency) -> Result<Series, StoreError> {
        let rows = self.source.observations(indicator, frequency)?;
        if rows.is_empty() {
            debug!(indicator, frequency = %frequency, "No stored observations");
            return Ok(Series::empty(indicator, frequency));
        }
        let decoded = decode_rows(indicator, frequency, rows);
        Ok(Series::new(indicator, frequency, decoded.points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_series::{InMemoryObservationSource, StoredValue};

    fn raw(date: &str, value: f64) -> RawObservation {
        RawObservation::new(date, StoredValue::Real(value))
    }

    #[test]
    fn load_missing_indicator_is_empty_not_error() {
        let source = InMemoryObservationSource::new();
        let series = SeriesLoader::new(&source).load("PGOLD", Frequency::Monthly).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.indicator(), "PGOLD");
    }

    #[test]
    fn load_parses_strict_then_lenient_and_drops_rest() {
        let mut source = InMemoryObservationSource::new();
        source.add_raw(
            "PGOLD",
            Frequency::Monthly,
            vec![
                raw("2020-02", 2.0),
                raw("2020-01-01", 1.0),
                raw("2020-03-01 00:00:00", 3.0),
                raw("not-a-date", 9.0),
                RawObservation::new("2020-04", StoredValue::Text("..".to_string())),
            ],
        );

        let series = SeriesLoader::new(&source).load("PGOLD", Frequency::Monthly).unwrap();
        let rendered: Vec<(String, f64)> = series
            .points()
            .iter()
            .map(|p| (p.period.to_string(), p.value))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("2020-01".to_string(), 1.0),
                ("2020-02".to_string(), 2.0),
                ("2020-03".to_string(), 3.0),
            ]
        );
    }

    #[test]
    fn decode_rows_reports_drop_counts() {
        let rows = vec![
            raw("2020-01", 1.0),
            raw("2020-01-01", 1.5),
            raw("bogus", 0.0),
            RawObservation::new("2020-02", StoredValue::Null),
        ];
        let decoded = decode_rows("PGOLD", Frequency::Monthly, rows);
        assert_eq!(decoded.points.len(), 1);
        assert_eq!(decoded.points[0].value, 1.0);
        assert_eq!(decoded.bad_periods, 1);
        assert_eq!(decoded.bad_values, 1);
        assert_eq!(decoded.duplicates, 1);
    }

    #[test]
    fn annual_rows_load_as_years() {
        let mut source = InMemoryObservationSource::new();
        source.add_raw(
            "PGOLD",
            Frequency::Annual,
            vec![raw("2001", 1.0), raw("2000", 0.5)],
        );
        let series = SeriesLoader::new(&source).load("PGOLD", Frequency::Annual).unwrap();
        assert_eq!(series.first_period(), Some(Period::Year(2000)));
        assert_eq!(series.latest_period(), Some(Period::Year(2001)));
    }
}
