use std::collections::BTreeMap;

use super::super::domain::ResolvedScore;

/// Index of the first period that counts double.
const DOUBLE_WEIGHT_FROM: usize = 2;

/// Combine a period's assessment total with its conduct average.
///
/// A missing or zero conduct average leaves the plain assessment mean. A zero
/// `count` yields `NaN` or infinity; callers check the period exists first.
pub fn weighted_average(total: f64, count: usize, conduct: Option<f64>, weight: u32) -> f64 {
    let weight = f64::from(weight);
    match conduct {
        Some(conduct) if conduct != 0.0 => (total + conduct) / (count as f64 + 1.0) * weight,
        _ => total / count as f64 * weight,
    }
}

/// Weight applied to the period at `index` (zero based).
pub fn period_weight(index: usize) -> u32 {
    weight_schedule(index + 1)
        .last()
        .map_or(1, |&(_, weight)| weight)
}

/// Ordered `(module, weight)` pairs for the first `periods` periods.
///
/// The weight starts at 1 and switches to 2 once the third period is reached.
pub fn weight_schedule(periods: usize) -> Vec<(u8, u32)> {
    (0..periods)
        .scan(1u32, |weight, index| {
            if index == DOUBLE_WEIGHT_FROM {
                *weight = 2;
            }
            let module = u8::try_from(index + 1).unwrap_or(u8::MAX);
            Some((module, *weight))
        })
        .collect()
}

pub fn round_to_thousandths(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub(super) fn group_by_module(scores: &[ResolvedScore]) -> BTreeMap<u8, Vec<ResolvedScore>> {
    let mut grouped: BTreeMap<u8, Vec<ResolvedScore>> = BTreeMap::new();
    for score in scores {
        grouped.entry(score.module).or_default().push(score.clone());
    }
    grouped
}

/// Sum of averages and number of scores in a module group.
pub(super) fn totals(group: &[ResolvedScore]) -> (f64, usize) {
    (group.iter().map(|score| score.average).sum(), group.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conduct_counts_as_an_extra_assessment() {
        let value = weighted_average(24.5, 3, Some(6.5), 1);
        assert!((value - 7.75).abs() < 1e-9);
    }

    #[test]
    fn zero_conduct_is_ignored() {
        assert_eq!(weighted_average(16.0, 2, Some(0.0), 1), 8.0);
        assert_eq!(weighted_average(16.0, 2, None, 2), 16.0);
    }

    #[test]
    fn empty_period_propagates_nan() {
        assert!(weighted_average(0.0, 0, None, 1).is_nan());
    }

    #[test]
    fn third_period_onwards_counts_double() {
        assert_eq!(
            weight_schedule(5),
            vec![(1, 1), (2, 1), (3, 2), (4, 2), (5, 2)]
        );
        assert_eq!(period_weight(0), 1);
        assert_eq!(period_weight(1), 1);
        assert_eq!(period_weight(2), 2);
    }

    #[test]
    fn rounds_to_three_places() {
        assert_eq!(round_to_thousandths(7.354_333), 7.354);
        assert_eq!(round_to_thousandths(8.166_666), 8.167);
    }
}
