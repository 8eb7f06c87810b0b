use crate::correlation::{Correlation, CorrelationResult};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// A result in final output order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    /// 1-based rank; `None` for retained undefined results
    pub rank: Option<usize>,
    pub result: CorrelationResult,
}

/// Orders results by correlation, strongest positive first.
///
/// Ties keep their input order. Undefined correlations are dropped when
/// `exclude_undefined` is set, otherwise appended unranked after every
/// defined result, still in input order.
pub fn rank(results: Vec<CorrelationResult>, exclude_undefined: bool) -> Vec<RankedResult> {
    let (mut defined, undefined): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|result| result.correlation.is_defined());

    defined.sort_by_key(|result| match result.correlation {
        Correlation::Defined(r) => Reverse(OrderedFloat(r)),
        Correlation::Undefined => Reverse(OrderedFloat(f64::NEG_INFINITY)),
    });

    let mut ranked: Vec<RankedResult> = defined
        .into_iter()
        .enumerate()
        .map(|(i, result)| RankedResult {
            rank: Some(i + 1),
            result,
        })
        .collect();

    if !exclude_undefined {
        ranked.extend(
            undefined
                .into_iter()
                .map(|result| RankedResult { rank: None, result }),
        );
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;

    fn result(a: &str, b: &str, correlation: Correlation) -> CorrelationResult {
        let start = Period::month(2020, 1).unwrap();
        CorrelationResult {
            indicator_a: a.to_string(),
            indicator_b: b.to_string(),
            description_a: a.to_string(),
            description_b: b.to_string(),
            window_start: start,
            window_end: start.offset(11),
            nominal_length: Some(12),
            sample_count: 12,
            correlation,
        }
    }

    fn pairs(ranked: &[RankedResult]) -> Vec<(Option<usize>, String)> {
        ranked
            .iter()
            .map(|r| (r.rank, format!("{}/{}", r.result.indicator_a, r.result.indicator_b)))
            .collect()
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank(
            vec![
                result("A", "B", Correlation::Defined(0.5)),
                result("C", "D", Correlation::Defined(0.9)),
                result("E", "F", Correlation::Defined(0.5)),
            ],
            true,
        );
        assert_eq!(
            pairs(&ranked),
            vec![
                (Some(1), "C/D".to_string()),
                (Some(2), "A/B".to_string()),
                (Some(3), "E/F".to_string()),
            ]
        );
    }

    #[test]
    fn negative_correlations_rank_last() {
        let ranked = rank(
            vec![
                result("A", "B", Correlation::Defined(-0.8)),
                result("C", "D", Correlation::Defined(0.1)),
            ],
            true,
        );
        assert_eq!(ranked[0].result.indicator_a, "C");
        assert_eq!(ranked[1].rank, Some(2));
    }

    #[test]
    fn undefined_dropped_or_appended_unranked() {
        let input = vec![
            result("U", "V", Correlation::Undefined),
            result("A", "B", Correlation::Defined(0.2)),
            result("W", "X", Correlation::Undefined),
        ];

        let dropped = rank(input.clone(), true);
        assert_eq!(pairs(&dropped), vec![(Some(1), "A/B".to_string())]);

        let kept = rank(input, false);
        assert_eq!(
            pairs(&kept),
            vec![
                (Some(1), "A/B".to_string()),
                (None, "U/V".to_string()),
                (None, "W/X".to_string()),
            ]
        );
    }

    #[test]
    fn empty_input_ranks_nothing() {
        assert!(rank(Vec::new(), false).is_empty());
    }
}
