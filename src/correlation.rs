//! Pearson correlation over aligned windows.
//!
//! Scoring is pure: the same window and threshold always produce the same
//! outcome, so pairs can be scored on any thread in any order.

use crate::align::AlignedWindow;
use crate::period::Period;
use crate::registry::IndicatorInfo;
use std::fmt;

/// Coefficient of one scored window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    /// Coefficient in `[-1, 1]`
    Defined(f64),
    /// One side of the window has zero variance
    Undefined,
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Defined(r) => Some(*r),
            Correlation::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Correlation::Defined(_))
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Defined(r) => write!(f, "{r:.6}"),
            Correlation::Undefined => write!(f, "undefined"),
        }
    }
}

/// Pearson product-moment correlation of two equal-length samples.
///
/// Returns [`Correlation::Undefined`] when either side is constant or when
/// there are fewer than two pairs. Rounding can push a perfect fit a hair
/// past the unit interval, so the result is clamped.
pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let len = x.len().min(y.len());
    if len < 2 {
        return Correlation::Undefined;
    }
    let (x, y) = (&x[..len], &y[..len]);

    if is_constant(x) || is_constant(y) {
        return Correlation::Undefined;
    }

    let n = len as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return Correlation::Undefined;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        Correlation::Defined(r.clamp(-1.0, 1.0))
    } else {
        Correlation::Undefined
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] == pair[1])
}

/// A scored window of one indicator pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult {
    pub indicator_a: String,
    pub indicator_b: String,
    pub description_a: String,
    pub description_b: String,
    pub window_start: Period,
    pub window_end: Period,
    /// Requested window length; `None` for full-history windows
    pub nominal_length: Option<usize>,
    pub sample_count: usize,
    pub correlation: Correlation,
}

/// A window that was not scored because too few periods aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientData {
    pub indicator_a: String,
    pub indicator_b: String,
    pub window_start: Period,
    pub window_end: Period,
    pub sample_count: usize,
    pub min_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(CorrelationResult),
    InsufficientData(InsufficientData),
}

impl ScoreOutcome {
    pub fn result(&self) -> Option<&CorrelationResult> {
        match self {
            ScoreOutcome::Scored(result) => Some(result),
            ScoreOutcome::InsufficientData(_) => None,
        }
    }

    pub fn into_result(self) -> Option<CorrelationResult> {
        match self {
            ScoreOutcome::Scored(result) => Some(result),
            ScoreOutcome::InsufficientData(_) => None,
        }
    }
}

/// Scores aligned windows against a minimum-sample threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationEngine {
    min_samples: usize,
}

impl CorrelationEngine {
    pub fn new(min_samples: usize) -> Self {
        CorrelationEngine { min_samples }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Scores one window of the pair `(a, b)`.
    ///
    /// # Arguments
    /// * `a` - First indicator of the pair; its values are the window's `a` side
    /// * `b` - Second indicator of the pair
    /// * `window` - Aligned points to correlate
    ///
    /// # Returns
    /// `InsufficientData` when the window holds fewer than `min_samples`
    /// points, otherwise a result whose correlation may be `Undefined`.
    pub fn score(&self, a: &IndicatorInfo, b: &IndicatorInfo, window: &AlignedWindow) -> ScoreOutcome {
        let sample_count = window.sample_count();
        if sample_count < self.min_samples {
            return ScoreOutcome::InsufficientData(InsufficientData {
                indicator_a: a.code.clone(),
                indicator_b: b.code.clone(),
                window_start: window.start,
                window_end: window.end,
                sample_count,
                min_samples: self.min_samples,
            });
        }

        let correlation = pearson(&window.values_a(), &window.values_b());
        ScoreOutcome::Scored(CorrelationResult {
            indicator_a: a.code.clone(),
            indicator_b: b.code.clone(),
            description_a: a.short_description().to_string(),
            description_b: b.short_description().to_string(),
            window_start: window.start,
            window_end: window.end,
            nominal_length: window.nominal_length,
            sample_count,
            correlation,
        })
    }
}
