//! Window alignment for pairs of series.
//!
//! Every strategy works on the inner join of two series on period: only
//! periods present in both survive. Strategies differ in how they carve
//! windows out of that join.

use crate::period::Period;
use crate::time_series::{Series, SeriesPoint};
use std::cmp::Ordering;

/// Minimum aligned samples for latest-window and full-history scoring,
/// independent of the requested window length.
pub const DEFAULT_MATRIX_MIN_SAMPLES: usize = 12;

/// One period present in both series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPoint {
    pub period: Period,
    pub a: f64,
    pub b: f64,
}

/// Common-period slice of two series used for one correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedWindow {
    /// First period of the window
    pub start: Period,
    /// Last period of the window
    pub end: Period,
    /// Requested length in periods; `None` for full-history windows
    pub nominal_length: Option<usize>,
    pub points: Vec<AlignedPoint>,
}

impl AlignedWindow {
    pub fn sample_count(&self) -> usize {
        self.points.len()
    }

    pub fn values_a(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.a).collect()
    }

    pub fn values_b(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.b).collect()
    }
}

/// Merge-joins two period-sorted slices, keeping periods present in both.
pub fn inner_join(a: &[SeriesPoint], b: &[SeriesPoint]) -> Vec<AlignedPoint> {
    let mut joined = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].period.cmp(&b[j].period) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                joined.push(AlignedPoint {
                    period: a[i].period,
                    a: a[i].value,
                    b: b[j].value,
                });
                i += 1;
                j += 1;
            }
        }
    }
    joined
}

/// Common behavior shared by every windowing strategy.
pub trait WindowStrategy {
    /// Aligned samples required before a window is scored, unless the caller
    /// overrides it.
    fn default_min_samples(&self) -> usize;

    /// Carves aligned windows out of two series, earliest first. Producing no
    /// windows is a normal outcome, not an error.
    fn windows(&self, a: &Series, b: &Series) -> Vec<AlignedWindow>;
}

/// Fixed-length window slid one period at a time over the whole join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    length: usize,
}

impl RollingWindow {
    pub fn new(length: usize) -> Self {
        RollingWindow {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl WindowStrategy for RollingWindow {
    fn default_min_samples(&self) -> usize {
        self.length
    }

    fn windows(&self, a: &Series, b: &Series) -> Vec<AlignedWindow> {
        let joined = inner_join(a.points(), b.points());
        if joined.len() < self.length {
            return Vec::new();
        }

        joined
            .windows(self.length)
            .map(|slice| AlignedWindow {
                start: slice[0].period,
                end: slice[slice.len() - 1].period,
                nominal_length: Some(self.length),
                points: slice.to_vec(),
            })
            .collect()
    }
}

/// Window of fixed calendar length ending at the earlier of the two series'
/// latest periods.
///
/// Boundaries come from the calendar, not from the join, so a gappy series
/// can leave fewer aligned points than the nominal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestWindow {
    length: usize,
}

impl LatestWindow {
    pub fn new(length: usize) -> Self {
        LatestWindow {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn window(&self, a: &Series, b: &Series) -> Option<AlignedWindow> {
        let end = a.latest_period()?.min(b.latest_period()?);
        let span = i64::try_from(self.length - 1).unwrap_or(i64::MAX);
        let start = end.offset(-span);
        let points = inner_join(a.slice_between(start, end), b.slice_between(start, end));
        Some(AlignedWindow {
            start,
            end,
            nominal_length: Some(self.length),
            points,
        })
    }
}

impl WindowStrategy for LatestWindow {
    fn default_min_samples(&self) -> usize {
        DEFAULT_MATRIX_MIN_SAMPLES
    }

    fn windows(&self, a: &Series, b: &Series) -> Vec<AlignedWindow> {
        self.window(a, b).into_iter().collect()
    }
}

/// The entire common history of a pair, uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FullHistory;

impl FullHistory {
    pub fn window(&self, a: &Series, b: &Series) -> Option<AlignedWindow> {
        let points = inner_join(a.points(), b.points());
        let start = points.first()?.period;
        let end = points.last()?.period;
        Some(AlignedWindow {
            start,
            end,
            nominal_length: None,
            points,
        })
    }
}

impl WindowStrategy for FullHistory {
    fn default_min_samples(&self) -> usize {
        DEFAULT_MATRIX_MIN_SAMPLES
    }

    fn windows(&self, a: &Series, b: &Series) -> Vec<AlignedWindow> {
        self.window(a, b).into_iter().collect()
    }
}

/// Window mode selected by configuration or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    Rolling(RollingWindow),
    Latest(LatestWindow),
    FullHistory,
}

impl WindowSpec {
    pub fn rolling(length: usize) -> Self {
        WindowSpec::Rolling(RollingWindow::new(length))
    }

    pub fn latest(length: usize) -> Self {
        WindowSpec::Latest(LatestWindow::new(length))
    }

    /// Requested length in periods, if the mode has one.
    pub fn nominal_length(&self) -> Option<usize> {
        match self {
            WindowSpec::Rolling(w) => Some(w.length()),
            WindowSpec::Latest(w) => Some(w.length()),
            WindowSpec::FullHistory => None,
        }
    }
}

impl WindowStrategy for WindowSpec {
    fn default_min_samples(&self) -> usize {
        match self {
            WindowSpec::Rolling(w) => w.default_min_samples(),
            WindowSpec::Latest(w) => w.default_min_samples(),
            WindowSpec::FullHistory => FullHistory.default_min_samples(),
        }
    }

    fn windows(&self, a: &Series, b: &Series) -> Vec<AlignedWindow> {
        match self {
            WindowSpec::Rolling(w) => w.windows(a, b),
            WindowSpec::Latest(w) => w.windows(a, b),
            WindowSpec::FullHistory => FullHistory.windows(a, b),
        }
    }
}
