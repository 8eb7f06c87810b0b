use crate::period::Period;
use crate::series_key::{Frequency, SeriesKey};
use crate::store::StoreError;
use std::collections::HashMap;

/// A single (period, value) pair of a commodity series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Calendar period of the observation
    pub period: Period,
    /// Observed value, always finite
    pub value: f64,
}

impl SeriesPoint {
    /// Creates a new SeriesPoint.
    pub fn new(period: Period, value: f64) -> Self {
        SeriesPoint { period, value }
    }
}

/// One observation as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub key: SeriesKey,
    pub period: Period,
    pub value: f64,
}

impl Observation {
    pub fn new(key: SeriesKey, period: Period, value: f64) -> Self {
        Observation { key, period, value }
    }
}

/// Value column exactly as read back from storage.
///
/// Rows may have entered the database through a looser writer, so the loader
/// has to cope with text and integer cells as well as reals.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Real(f64),
    Integer(i64),
    Text(String),
    Null,
}

impl StoredValue {
    /// Returns the cell as a finite number, or `None` when it cannot be read
    /// as one.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            StoredValue::Real(v) => *v,
            StoredValue::Integer(v) => *v as f64,
            StoredValue::Text(s) => s.trim().parse::<f64>().ok()?,
            StoredValue::Null => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// An undecoded stored row: period text plus raw value cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub date: String,
    pub value: StoredValue,
}

impl RawObservation {
    pub fn new(date: impl Into<String>, value: StoredValue) -> Self {
        RawObservation {
            date: date.into(),
            value,
        }
    }
}

/// Ordered observations of one indicator at one frequency.
///
/// Periods are strictly increasing. Missing periods are simply absent;
/// nothing is interpolated or forward-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    indicator: String,
    frequency: Frequency,
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Builds a series, sorting by period and keeping the first point for any
    /// repeated period.
    pub fn new(indicator: impl Into<String>, frequency: Frequency, mut points: Vec<SeriesPoint>) -> Self {
        points.sort_by_key(|point| point.period);
        points.dedup_by_key(|point| point.period);
        Series {
            indicator: indicator.into(),
            frequency,
            points,
        }
    }

    /// An empty series: the normal outcome for an indicator with no data.
    pub fn empty(indicator: impl Into<String>, frequency: Frequency) -> Self {
        Series::new(indicator, frequency, Vec::new())
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_period(&self) -> Option<Period> {
        self.points.first().map(|p| p.period)
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.points.last().map(|p| p.period)
    }

    /// Returns the points whose period lies in `[start, end]`.
    pub fn slice_between(&self, start: Period, end: Period) -> &[SeriesPoint] {
        let lo = self.points.partition_point(|p| p.period < start);
        let hi = self.points.partition_point(|p| p.period <= end);
        if lo >= hi {
            return &[];
        }
        &self.points[lo..hi]
    }
}

/// Source of stored observations for one indicator.
///
/// Implemented by the SQLite series store; the in-memory implementation below
/// lets loader and analysis code be tested without a database.
pub trait ObservationSource {
    /// Returns every stored row of `indicator` at `frequency`, in storage
    /// order. Rows are not decoded; that is the loader's job.
    fn observations(
        &self,
        indicator: &str,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, StoreError>;
}

/// In-memory observation source for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObservationSource {
    data: HashMap<(String, Frequency), Vec<RawObservation>>,
}

impl InMemoryObservationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw rows for an indicator.
    pub fn add_raw(&mut self, indicator: &str, frequency: Frequency, rows: Vec<RawObservation>) {
        self.data
            .entry((indicator.to_string(), frequency))
            .or_default()
            .extend(rows);
    }

    /// Appends already-typed points, stored in canonical period format.
    pub fn add_points(&mut self, indicator: &str, frequency: Frequency, points: &[SeriesPoint]) {
        let rows = points
            .iter()
            .map(|p| RawObservation::new(p.period.to_string(), StoredValue::Real(p.value)))
            .collect();
        self.add_raw(indicator, frequency, rows);
    }
}

impl ObservationSource for InMemoryObservationSource {
    fn observations(
        &self,
        indicator: &str,
        frequency: Frequency,
    ) -> Result<Vec<RawObservation>, StoreError> {
        Ok(self
            .data
            .get(&(indicator.to_string(), frequency))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(year: i32, month: u32) -> Period {
        Period::month(year, month).unwrap()
    }

    #[test]
    fn test_series_sorts_and_drops_repeated_periods() {
        let series = Series::new(
            "PGOLD",
            Frequency::Monthly,
            vec![
                SeriesPoint::new(m(2020, 3), 3.0),
                SeriesPoint::new(m(2020, 1), 1.0),
                SeriesPoint::new(m(2020, 3), 99.0),
            ],
        );
        let periods: Vec<_> = series.points().iter().map(|p| p.period).collect();
        assert_eq!(periods, vec![m(2020, 1), m(2020, 3)]);
        assert_eq!(series.points()[1].value, 3.0);
    }

    #[test]
    fn test_slice_between_inclusive() {
        let points = (1..=6).map(|i| SeriesPoint::new(m(2020, i), i as f64)).collect();
        let series = Series::new("X", Frequency::Monthly, points);
        let slice = series.slice_between(m(2020, 2), m(2020, 4));
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].value, 2.0);
        assert_eq!(slice[2].value, 4.0);
        assert!(series.slice_between(m(2021, 1), m(2021, 6)).is_empty());
        assert!(series.slice_between(m(2020, 5), m(2020, 2)).is_empty());
    }

    #[test]
    fn test_stored_value_as_f64() {
        assert_eq!(StoredValue::Real(1.5).as_f64(), Some(1.5));
        assert_eq!(StoredValue::Integer(4).as_f64(), Some(4.0));
        assert_eq!(StoredValue::Text(" 2.25 ".to_string()).as_f64(), Some(2.25));
        assert_eq!(StoredValue::Text("n/a".to_string()).as_f64(), None);
        assert_eq!(StoredValue::Text("NaN".to_string()).as_f64(), None);
        assert_eq!(StoredValue::Real(f64::INFINITY).as_f64(), None);
        assert_eq!(StoredValue::Null.as_f64(), None);
    }

    #[test]
    fn test_in_memory_source_missing_indicator_is_empty() {
        let source = InMemoryObservationSource::new();
        let rows = source.observations("PGOLD", Frequency::Monthly).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_in_memory_source_separates_frequencies() {
        let mut source = InMemoryObservationSource::new();
        source.add_points("PGOLD", Frequency::Monthly, &[SeriesPoint::new(m(2020, 1), 1.0)]);
        source.add_points("PGOLD", Frequency::Annual, &[SeriesPoint::new(Period::Year(2020), 1.0)]);

        let monthly = source.observations("PGOLD", Frequency::Monthly).unwrap();
        assert_eq!(monthly, vec![RawObservation::new("2020-01", StoredValue::Real(1.0))]);
        assert_eq!(source.observations("PGOLD", Frequency::Annual).unwrap().len(), 1);
    }
}
