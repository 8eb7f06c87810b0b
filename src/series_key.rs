use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Sampling frequency of a commodity series.
///
/// Only monthly and annual series are stored; the upstream also publishes
/// quarterly data, which is never requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Monthly observations (`M`)
    Monthly,
    /// Annual observations (`A`)
    Annual,
}

impl Frequency {
    /// Returns the single-letter code used in series keys and the database.
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Monthly => "M",
            Frequency::Annual => "A",
        }
    }

    /// Parses a frequency code (`M` or `A`).
    pub fn from_code(code: &str) -> Result<Self, SeriesKeyError> {
        match code {
            "M" => Ok(Frequency::Monthly),
            "A" => Ok(Frequency::Annual),
            other => Err(SeriesKeyError::UnknownFrequency(other.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Identity of one stored time series.
///
/// The four components mirror the upstream SDMX key dimensions:
/// frequency, reference area, commodity indicator and unit of measure.
/// The serialized form joins them with dots, e.g. `M.W00.PGOLD.USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    frequency: Frequency,
    area: String,
    indicator: String,
    unit: String,
}

impl SeriesKey {
    /// Creates a new series key.
    ///
    /// # Errors
    /// Returns an error if any of the text components is empty or contains
    /// characters outside `[A-Za-z0-9_-]`. Dots are rejected because they are
    /// the component separator of the serialized form.
    pub fn new(
        frequency: Frequency,
        area: impl Into<String>,
        indicator: impl Into<String>,
        unit: impl Into<String>,
    ) -> Result<Self, SeriesKeyError> {
        let area = area.into();
        let indicator = indicator.into();
        let unit = unit.into();
        Self::validate_component(&area)?;
        Self::validate_component(&indicator)?;
        Self::validate_component(&unit)?;
        Ok(SeriesKey {
            frequency,
            area,
            indicator,
            unit,
        })
    }

    fn validate_component(component: &str) -> Result<(), SeriesKeyError> {
        if component.is_empty() {
            return Err(SeriesKeyError::EmptyComponent);
        }

        if !component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SeriesKeyError::InvalidCharacters(component.to_string()));
        }

        Ok(())
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns the dot-joined storage identity (`FREQ.AREA.INDICATOR.UNIT`).
    pub fn as_string(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.frequency.code(),
            self.area,
            self.indicator,
            self.unit
        )
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for SeriesKey {
    type Err = SeriesKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(SeriesKeyError::Malformed(s.to_string()));
        }
        let frequency = Frequency::from_code(parts[0])?;
        SeriesKey::new(frequency, parts[1], parts[2], parts[3])
    }
}

/// Errors that can occur when creating or parsing series keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesKeyError {
    #[error("series key component cannot be empty")]
    EmptyComponent,
    #[error("series key component '{0}' contains invalid characters")]
    InvalidCharacters(String),
    #[error("unknown frequency code '{0}'")]
    UnknownFrequency(String),
    #[error("malformed series key '{0}', expected FREQ.AREA.INDICATOR.UNIT")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_key_creation_valid() {
        let key = SeriesKey::new(Frequency::Monthly, "W00", "PGOLD", "USD").unwrap();
        assert_eq!(key.frequency(), Frequency::Monthly);
        assert_eq!(key.area(), "W00");
        assert_eq!(key.indicator(), "PGOLD");
        assert_eq!(key.unit(), "USD");
    }

    #[test]
    fn test_series_key_as_string_is_dot_joined() {
        let key = SeriesKey::new(Frequency::Annual, "W00", "PALLFNF", "IX").unwrap();
        assert_eq!(key.as_string(), "A.W00.PALLFNF.IX");
        assert_eq!(format!("{}", key), "A.W00.PALLFNF.IX");
    }

    #[test]
    fn test_series_key_empty_component() {
        let result = SeriesKey::new(Frequency::Monthly, "W00", "", "USD");
        assert_eq!(result.unwrap_err(), SeriesKeyError::EmptyComponent);
    }

    #[test]
    fn test_series_key_rejects_separator_in_component() {
        let result = SeriesKey::new(Frequency::Monthly, "W00", "PGO.LD", "USD");
        assert!(matches!(result, Err(SeriesKeyError::InvalidCharacters(_))));
    }

    #[test]
    fn test_series_key_parse_round_trip() {
        let key: SeriesKey = "M.W00.POILWTI.USD".parse().unwrap();
        assert_eq!(key.indicator(), "POILWTI");
        assert_eq!(key.as_string(), "M.W00.POILWTI.USD");
    }

    #[test]
    fn test_series_key_parse_malformed() {
        assert!(matches!(
            "M.W00.PGOLD".parse::<SeriesKey>(),
            Err(SeriesKeyError::Malformed(_))
        ));
        assert_eq!(
            "Q.W00.PGOLD.USD".parse::<SeriesKey>().unwrap_err(),
            SeriesKeyError::UnknownFrequency("Q".to_string())
        );
    }

    #[test]
    fn test_series_key_hashable() {
        use std::collections::HashMap;

        let key1 = SeriesKey::new(Frequency::Monthly, "W00", "PGOLD", "USD").unwrap();
        let key2 = SeriesKey::new(Frequency::Monthly, "W00", "PGOLD", "USD").unwrap();
        let key3 = SeriesKey::new(Frequency::Annual, "W00", "PGOLD", "USD").unwrap();

        let mut map = HashMap::new();
        map.insert(key1, "gold");
        assert_eq!(map.get(&key2), Some(&"gold"));
        assert_eq!(map.get(&key3), None);
    }
}
