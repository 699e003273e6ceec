use super::super::domain::{ResolvedConduct, ResolvedScore};
use super::StrategyOutput;

/// Flat mean: the academic mean counts once, next to each conduct average.
pub(super) fn average(scores: &[ResolvedScore], conduct: Option<&ResolvedConduct>) -> StrategyOutput {
    let academic = (!scores.is_empty())
        .then(|| scores.iter().map(|score| score.average).sum::<f64>() / scores.len() as f64);

    let components: Vec<f64> = academic
        .into_iter()
        .chain(
            conduct
                .into_iter()
                .flat_map(|conduct| conduct.behavior_average_status.iter())
                .map(|entry| entry.behavior_average),
        )
        .collect();

    let average = if components.is_empty() {
        0.0
    } else {
        components.iter().sum::<f64>() / components.len() as f64
    };

    (average, scores.to_vec(), None)
}
