use super::super::domain::{
    AcademicStatus, Concept, ConductAverage, ResolvedConduct, ScoreResolution,
    StudentAverageStatus, MONTHS_PER_YEAR,
};
use super::config::{ConceptBand, PolicyConfig};
use super::ConductShape;

pub(crate) fn resolve_score(
    config: &PolicyConfig,
    final_mark: f64,
    first_recovery: Option<f64>,
    second_recovery: Option<f64>,
    special_exam: Option<f64>,
) -> ScoreResolution {
    let passing = config.passing_average;

    if let Some(special) = special_exam {
        return ScoreResolution {
            average: special,
            status: if special >= passing {
                AcademicStatus::Approved
            } else {
                AcademicStatus::Disapproved
            },
            is_recovering: false,
        };
    }

    if final_mark >= passing {
        return ScoreResolution {
            average: final_mark,
            status: AcademicStatus::Approved,
            is_recovering: false,
        };
    }

    match (first_recovery, second_recovery) {
        (None, _) => ScoreResolution {
            average: final_mark,
            status: AcademicStatus::Disapproved,
            is_recovering: false,
        },
        (Some(first), _) if first >= passing => ScoreResolution {
            average: first,
            status: AcademicStatus::ApprovedInRecovery,
            is_recovering: true,
        },
        (Some(first), None) => ScoreResolution {
            average: first,
            status: AcademicStatus::Disapproved,
            is_recovering: true,
        },
        (Some(_), Some(second)) if second >= passing => ScoreResolution {
            average: second,
            status: AcademicStatus::ApprovedInRecovery,
            is_recovering: true,
        },
        (Some(_), Some(second)) => ScoreResolution {
            average: second,
            status: AcademicStatus::SecondSeason,
            is_recovering: true,
        },
    }
}

pub(crate) fn resolve_conduct(
    config: &PolicyConfig,
    monthly_scores: &[Option<f64>; MONTHS_PER_YEAR],
    shape: ConductShape,
) -> ResolvedConduct {
    let behaviors_count = monthly_scores.iter().flatten().count();

    let windows: Vec<Option<f64>> = match shape {
        ConductShape::Single => vec![mean(monthly_scores.iter().flatten().copied())],
        ConductShape::Periods => monthly_scores
            .chunks(config.months_per_period.max(1))
            .map(|chunk| mean(chunk.iter().flatten().copied()))
            .collect(),
    };

    // Trailing windows without marks are periods that have not happened yet.
    let recorded = windows
        .iter()
        .rposition(Option::is_some)
        .map_or(0, |last| last + 1);

    let behavior_average_status = windows[..recorded]
        .iter()
        .map(|window| {
            let behavior_average = window.unwrap_or(0.0);
            ConductAverage {
                behavior_average,
                status: if behavior_average >= config.conduct_passing_average {
                    AcademicStatus::Approved
                } else {
                    AcademicStatus::Disapproved
                },
            }
        })
        .collect();

    ResolvedConduct {
        behavior_average_status,
        behaviors_count,
    }
}

pub(crate) fn resolve_status(
    config: &PolicyConfig,
    average: f64,
    is_recovering: bool,
) -> StudentAverageStatus {
    let status = if average >= config.passing_average {
        if is_recovering {
            AcademicStatus::ApprovedInRecovery
        } else {
            AcademicStatus::Approved
        }
    } else {
        AcademicStatus::Disapproved
    };

    StudentAverageStatus {
        concept: concept_for(&config.concept_bands, average),
        status,
    }
}

fn concept_for(bands: &[ConceptBand], average: f64) -> Concept {
    let mut ordered: Vec<&ConceptBand> = bands.iter().collect();
    ordered.sort_by(|a, b| b.minimum.total_cmp(&a.minimum));

    ordered
        .iter()
        .find(|band| average >= band.minimum)
        .or_else(|| ordered.last())
        .map_or(Concept::Insufficient, |band| band.concept)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (total, count) = values.fold((0.0, 0usize), |(total, count), value| {
        (total + value, count + 1)
    });
    (count > 0).then(|| total / count as f64)
}
