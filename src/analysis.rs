//! Correlation drivers: the all-pairs matrix and the rolling single pair.

use crate::align::{RollingWindow, WindowSpec, WindowStrategy};
use crate::correlation::{CorrelationEngine, CorrelationResult, ScoreOutcome};
use crate::loader::SeriesLoader;
use crate::ranking::{rank, RankedResult};
use crate::registry::{IndicatorInfo, IndicatorRegistry};
use crate::series_key::Frequency;
use crate::store::StoreError;
use crate::time_series::{ObservationSource, Series};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pairs scored between progress log lines.
pub const PROGRESS_INTERVAL: usize = 500;

/// Default rolling window length in periods.
pub const DEFAULT_ROLLING_WINDOW: usize = 60;

/// Longest window accepted from the command line, in periods.
pub const MAX_WINDOW_LENGTH: usize = 12_000;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("indicator {0} is not known to the registry")]
    UnknownIndicator(String),
    #[error("a pair needs two different indicators, got {0} twice")]
    SameIndicator(String),
    #[error("window length {length} is outside {min}..={max}")]
    WindowLength { length: usize, min: usize, max: usize },
}

/// Checks a requested window length against `min..=MAX_WINDOW_LENGTH`.
pub fn checked_window_length(length: usize, min: usize) -> Result<usize, AnalysisError> {
    if (min..=MAX_WINDOW_LENGTH).contains(&length) {
        Ok(length)
    } else {
        Err(AnalysisError::WindowLength {
            length,
            min,
            max: MAX_WINDOW_LENGTH,
        })
    }
}

/// Indicators considered by a matrix run, in code order.
pub fn indicator_universe(
    registry: &IndicatorRegistry<'_>,
    include_inactive: bool,
) -> Result<Vec<IndicatorInfo>, StoreError> {
    let rows = if include_inactive {
        registry.all()?
    } else {
        registry.active()?
    };
    Ok(rows.iter().map(|row| row.info()).collect())
}

/// Looks up both codes of a rolling pair.
pub fn resolve_pair(
    registry: &IndicatorRegistry<'_>,
    first: &str,
    second: &str,
) -> Result<(IndicatorInfo, IndicatorInfo), AnalysisError> {
    if first == second {
        return Err(AnalysisError::SameIndicator(first.to_string()));
    }
    let lookup = |code: &str| -> Result<IndicatorInfo, AnalysisError> {
        registry
            .get(code)?
            .map(|row| row.info())
            .ok_or_else(|| AnalysisError::UnknownIndicator(code.to_string()))
    };
    Ok((lookup(first)?, lookup(second)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixConfig {
    pub window: WindowSpec,
    /// Overrides the window mode's default threshold
    pub min_samples: Option<usize>,
    pub frequency: Frequency,
    pub exclude_undefined: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        MatrixConfig {
            window: WindowSpec::FullHistory,
            min_samples: None,
            frequency: Frequency::Monthly,
            exclude_undefined: true,
        }
    }
}

impl MatrixConfig {
    pub fn effective_min_samples(&self) -> usize {
        self.min_samples
            .unwrap_or_else(|| self.window.default_min_samples())
    }
}

/// Outcome of a matrix run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixReport {
    /// Indicators with at least one point
    pub indicators_loaded: usize,
    /// Indicators skipped because nothing was stored for them
    pub indicators_without_data: usize,
    pub pairs_total: usize,
    /// Windows that produced a result, defined or not
    pub scored: usize,
    /// Scored windows whose correlation is undefined
    pub undefined: usize,
    /// Windows below the sample threshold
    pub insufficient: usize,
    /// Pairs whose series never overlap
    pub no_overlap: usize,
    pub ranked: Vec<RankedResult>,
}

/// Scores every unordered pair of a universe and ranks the results.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationMatrix {
    config: MatrixConfig,
}

impl CorrelationMatrix {
    pub fn new(config: MatrixConfig) -> Self {
        CorrelationMatrix { config }
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    /// Loads the universe's series, then scores all pairs in parallel.
    ///
    /// Pairs are enumerated in universe order and results are collected in
    /// that order, so ranking is reproducible regardless of thread count.
    pub fn run<S: ObservationSource>(
        &self,
        source: &S,
        universe: &[IndicatorInfo],
    ) -> Result<MatrixReport, StoreError> {
        let min_samples = self.config.effective_min_samples();
        if let Some(length) = self.config.window.nominal_length() {
            if length < min_samples {
                warn!(
                    window = length,
                    min_samples, "Window is shorter than the sample threshold; every pair will be insufficient"
                );
            }
        }

        let mut report = MatrixReport::default();
        let loader = SeriesLoader::new(source);
        let mut loaded: Vec<(&IndicatorInfo, Series)> = Vec::with_capacity(universe.len());
        for indicator in universe {
            let series = loader.load(&indicator.code, self.config.frequency)?;
            if series.is_empty() {
                debug!(indicator = %indicator.code, "Skipping indicator without data");
                report.indicators_without_data += 1;
                continue;
            }
            loaded.push((indicator, series));
        }
        report.indicators_loaded = loaded.len();

        let pairs: Vec<(usize, usize)> = (0..loaded.len())
            .flat_map(|i| (i + 1..loaded.len()).map(move |j| (i, j)))
            .collect();
        report.pairs_total = pairs.len();
        info!(
            indicators = loaded.len(),
            pairs = pairs.len(),
            min_samples,
            "Scoring indicator pairs"
        );

        let engine = CorrelationEngine::new(min_samples);
        let window = self.config.window;
        let done = AtomicUsize::new(0);
        let total = pairs.len();

        let outcomes: Vec<Vec<ScoreOutcome>> = pairs
            .par_iter()
            .map(|&(i, j)| {
                let (info_a, series_a) = &loaded[i];
                let (info_b, series_b) = &loaded[j];
                let scored: Vec<ScoreOutcome> = window
                    .windows(series_a, series_b)
                    .iter()
                    .map(|w| engine.score(info_a, info_b, w))
                    .collect();

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % PROGRESS_INTERVAL == 0 {
                    info!(finished, total, "Pair scoring progress");
                }
                scored
            })
            .collect();

        let mut results: Vec<CorrelationResult> = Vec::new();
        for pair_outcomes in outcomes {
            if pair_outcomes.is_empty() {
                report.no_overlap += 1;
            }
            for outcome in pair_outcomes {
                match outcome {
                    ScoreOutcome::Scored(result) => {
                        report.scored += 1;
                        if !result.correlation.is_defined() {
                            report.undefined += 1;
                        }
                        results.push(result);
                    }
                    ScoreOutcome::InsufficientData(_) => report.insufficient += 1,
                }
            }
        }

        report.ranked = rank(results, self.config.exclude_undefined);
        info!(
            pairs = report.pairs_total,
            scored = report.scored,
            undefined = report.undefined,
            insufficient = report.insufficient,
            no_overlap = report.no_overlap,
            "Correlation matrix complete"
        );
        Ok(report)
    }
}

/// Outcome of a rolling single-pair run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingReport {
    /// Periods present in both series
    pub common_periods: usize,
    /// One result per window, earliest first
    pub windows: Vec<CorrelationResult>,
    pub undefined: usize,
}

/// Slides a fixed window over the common history of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingPairAnalysis {
    window: RollingWindow,
    frequency: Frequency,
}

impl RollingPairAnalysis {
    pub fn new(length: usize, frequency: Frequency) -> Self {
        RollingPairAnalysis {
            window: RollingWindow::new(length),
            frequency,
        }
    }

    pub fn window_length(&self) -> usize {
        self.window.length()
    }

    pub fn run<S: ObservationSource>(
        &self,
        source: &S,
        a: &IndicatorInfo,
        b: &IndicatorInfo,
    ) -> Result<RollingReport, AnalysisError> {
        if a.code == b.code {
            return Err(AnalysisError::SameIndicator(a.code.clone()));
        }

        let loader = SeriesLoader::new(source);
        let series_a = loader.load(&a.code, self.frequency)?;
        let series_b = loader.load(&b.code, self.frequency)?;
        let common_periods = crate::align::inner_join(series_a.points(), series_b.points()).len();

        let engine = CorrelationEngine::new(self.window.default_min_samples());
        let mut report = RollingReport {
            common_periods,
            ..RollingReport::default()
        };
        for window in self.window.windows(&series_a, &series_b) {
            if let Some(result) = engine.score(a, b, &window).into_result() {
                if !result.correlation.is_defined() {
                    report.undefined += 1;
                }
                report.windows.push(result);
            }
        }

        if report.windows.is_empty() {
            warn!(
                first = %a.code,
                second = %b.code,
                common_periods,
                window = self.window.length(),
                "Not enough common history for a single rolling window"
            );
        } else {
            info!(
                first = %a.code,
                second = %b.code,
                windows = report.windows.len(),
                "Rolling correlation complete"
            );
        }
        Ok(report)
    }
}
