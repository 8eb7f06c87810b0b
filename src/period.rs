//! Calendar periods that index commodity series.
//!
//! A period is either a calendar month or a calendar year, never finer.
//! Periods order chronologically and support offset arithmetic in units of
//! their own frequency, which is what the window aligner needs to compute
//! `end - (L - 1)` boundaries.

use crate::series_key::Frequency;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::fmt;
use thiserror::Error;

/// A calendar month or year.
///
/// Ordering is chronological within one frequency. Monthly and annual periods
/// never share a series, so cross-frequency ordering is not meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Month { year: i32, month: u32 },
    Year(i32),
}

/// Errors that can occur when parsing a stored or upstream period string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodParseError {
    #[error("unrecognised {frequency} period '{input}'")]
    Unrecognised { input: String, frequency: Frequency },
    #[error("month {0} is out of range")]
    InvalidMonth(u32),
}

const LENIENT_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const LENIENT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

impl Period {
    /// Creates a monthly period.
    pub fn month(year: i32, month: u32) -> Result<Self, PeriodParseError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodParseError::InvalidMonth(month));
        }
        Ok(Period::Month { year, month })
    }

    /// Creates an annual period.
    pub fn year(year: i32) -> Self {
        Period::Year(year)
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Period::Month { .. } => Frequency::Monthly,
            Period::Year(_) => Frequency::Annual,
        }
    }

    /// Position on a linear axis counted in units of the period's frequency.
    pub fn ordinal(&self) -> i64 {
        match *self {
            Period::Month { year, month } => year as i64 * 12 + (month as i64 - 1),
            Period::Year(year) => year as i64,
        }
    }

    fn from_ordinal(frequency: Frequency, ordinal: i64) -> Option<Self> {
        match frequency {
            Frequency::Monthly => Some(Period::Month {
                year: i32::try_from(ordinal.div_euclid(12)).ok()?,
                month: ordinal.rem_euclid(12) as u32 + 1,
            }),
            Frequency::Annual => i32::try_from(ordinal).ok().map(Period::Year),
        }
    }

    /// Shifts the period by `periods` units of its own frequency. `None` when
    /// the year leaves the `i32` range.
    pub fn checked_offset(&self, periods: i64) -> Option<Self> {
        Self::from_ordinal(self.frequency(), self.ordinal().checked_add(periods)?)
    }

    /// Shifts the period by `periods` units of its own frequency, stopping at
    /// the earliest or latest representable period.
    pub fn offset(&self, periods: i64) -> Self {
        self.checked_offset(periods)
            .unwrap_or_else(|| self.boundary(periods < 0))
    }

    fn boundary(&self, earliest: bool) -> Self {
        let year = if earliest { i32::MIN } else { i32::MAX };
        match self.frequency() {
            Frequency::Monthly => Period::Month {
                year,
                month: if earliest { 1 } else { 12 },
            },
            Frequency::Annual => Period::Year(year),
        }
    }

    /// Converts a calendar date into the period containing it.
    pub fn from_date(date: NaiveDate, frequency: Frequency) -> Self {
        match frequency {
            Frequency::Monthly => Period::Month {
                year: date.year(),
                month: date.month(),
            },
            Frequency::Annual => Period::Year(date.year()),
        }
    }

    /// Parses a period string, strict format first, lenient fallback second.
    pub fn parse(input: &str, frequency: Frequency) -> Result<Self, PeriodParseError> {
        Self::parse_strict(input, frequency).or_else(|_| Self::parse_lenient(input, frequency))
    }

    /// Accepts only the canonical storage format: `YYYY-MM` for monthly
    /// series and `YYYY` for annual series.
    pub fn parse_strict(input: &str, frequency: Frequency) -> Result<Self, PeriodParseError> {
        let unrecognised = || PeriodParseError::Unrecognised {
            input: input.to_string(),
            frequency,
        };

        match frequency {
            Frequency::Monthly => {
                let (year, month) = input.split_once('-').ok_or_else(unrecognised)?;
                if !is_digits(year, 4) || !is_digits(month, 2) {
                    return Err(unrecognised());
                }
                let year: i32 = year.parse().map_err(|_| unrecognised())?;
                let month: u32 = month.parse().map_err(|_| unrecognised())?;
                Period::month(year, month)
            }
            Frequency::Annual => {
                if !is_digits(input, 4) {
                    return Err(unrecognised());
                }
                input.parse().map(Period::Year).map_err(|_| unrecognised())
            }
        }
    }

    /// Best-effort parser for period strings written by older or looser
    /// writers: full dates, timestamps, `YYYY/MM`, `YYYYMM`, `YYYY-M`,
    /// quarters (`YYYY-Qn`) and bare years. The result is truncated to the
    /// requested frequency; a bare year maps to its first month.
    pub fn parse_lenient(input: &str, frequency: Frequency) -> Result<Self, PeriodParseError> {
        let trimmed = input.trim();
        let unrecognised = || PeriodParseError::Unrecognised {
            input: input.to_string(),
            frequency,
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_date(dt.date_naive(), frequency));
        }
        for format in LENIENT_DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::from_date(dt.date(), frequency));
            }
        }
        for format in LENIENT_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Ok(Self::from_date(date, frequency));
            }
        }

        let (year, month) = if let Some((year, rest)) = trimmed.split_once(['-', '/']) {
            let month = match rest.strip_prefix(['Q', 'q']) {
                Some(quarter) => {
                    let quarter: u32 = quarter.parse().map_err(|_| unrecognised())?;
                    if !(1..=4).contains(&quarter) {
                        return Err(unrecognised());
                    }
                    (quarter - 1) * 3 + 1
                }
                None if (1..=2).contains(&rest.len()) && is_digits(rest, rest.len()) => {
                    rest.parse().map_err(|_| unrecognised())?
                }
                None => return Err(unrecognised()),
            };
            (year, month)
        } else if is_digits(trimmed, 6) {
            let (year, month) = trimmed.split_at(4);
            (year, month.parse().map_err(|_| unrecognised())?)
        } else {
            (trimmed, 1)
        };

        if !is_digits(year, 4) {
            return Err(unrecognised());
        }
        let year: i32 = year.parse().map_err(|_| unrecognised())?;
        let month = Period::month(year, month).map_err(|_| unrecognised())?;
        Ok(match frequency {
            Frequency::Monthly => month,
            Frequency::Annual => Period::Year(year),
        })
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            Period::Year(year) => write!(f, "{:04}", year),
        }
    }
}
