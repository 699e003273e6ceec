use std::collections::BTreeMap;

use super::super::domain::{ResolvedConduct, ResolvedScore};
use super::weighting::{group_by_module, period_weight, totals, weight_schedule, weighted_average};
use super::StrategyOutput;

/// Module holding the capstone work, when the course has one.
const CAPSTONE_MODULE: u8 = 4;

pub(super) fn average(scores: &[ResolvedScore], conduct: Option<&ResolvedConduct>) -> StrategyOutput {
    let per_period = group_by_module(scores);

    let average = conduct
        .filter(|conduct| conduct.has_entries())
        .and_then(|conduct| with_conduct(&per_period, conduct))
        .unwrap_or_else(|| without_conduct(&per_period));

    (average, scores.to_vec(), Some(per_period))
}

/// Weighted mean of each period's assessments blended with its conduct.
fn with_conduct(
    per_period: &BTreeMap<u8, Vec<ResolvedScore>>,
    conduct: &ResolvedConduct,
) -> Option<f64> {
    let entries = &conduct.behavior_average_status;

    let (weighted, applied) = weight_schedule(entries.len())
        .into_iter()
        .zip(entries)
        .filter_map(|((module, weight), entry)| {
            per_period.get(&module).map(|group| {
                let (total, count) = totals(group);
                (
                    weighted_average(total, count, Some(entry.behavior_average), weight),
                    weight,
                )
            })
        })
        .fold((0.0, 0u32), |(sum, weights), (figure, weight)| {
            (sum + figure, weights + weight)
        });

    (applied > 0).then(|| weighted / f64::from(applied))
}

fn without_conduct(per_period: &BTreeMap<u8, Vec<ResolvedScore>>) -> f64 {
    let figure = |module: u8| {
        per_period.get(&module).map_or(0.0, |group| {
            let (total, count) = totals(group);
            weighted_average(total, count, None, period_weight(usize::from(module) - 1))
        })
    };

    let core = figure(1) + figure(2) + figure(3);

    match per_period.get(&CAPSTONE_MODULE) {
        Some(capstone) => {
            let (total, count) = totals(capstone);
            let capstone = weighted_average(total, count, None, 1);
            (core + 2.0 * capstone) / 6.0
        }
        None => core / 4.0,
    }
}
