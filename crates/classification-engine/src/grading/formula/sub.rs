use super::super::domain::{ResolvedConduct, ResolvedScore};
use super::weighting::{group_by_module, period_weight, totals, weighted_average};
use super::{StrategyOutput, SubModule};

/// Figure for a single module, brought back to a single-period scale.
pub(super) fn average(
    scores: &[ResolvedScore],
    conduct: Option<&ResolvedConduct>,
    module: SubModule,
) -> StrategyOutput {
    let per_period = group_by_module(scores);
    let assessments = per_period
        .get(&module.number())
        .cloned()
        .unwrap_or_default();

    let weight = period_weight(module.index());
    let behavior = conduct
        .and_then(|conduct| conduct.behavior_average_status.get(module.index()))
        .map(|entry| entry.behavior_average);

    let average = if assessments.is_empty() {
        0.0
    } else {
        let (total, count) = totals(&assessments);
        weighted_average(total, count, behavior, weight) / f64::from(weight)
    };

    (average, assessments, Some(per_period))
}
