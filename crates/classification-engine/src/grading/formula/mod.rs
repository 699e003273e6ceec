//! Aggregation strategies that reduce resolved scores and conduct to one grade.

mod module;
mod period;
mod sub;
mod weighting;

pub use weighting::{period_weight, round_to_thousandths, weight_schedule, weighted_average};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    AcademicStatus, ConductAverage, FormulaCode, ResolvedConduct, ResolvedScore,
    StudentAverageStatus,
};
use super::policy::StatusResolver;

/// Module that can be ranked on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubModule(u8);

impl SubModule {
    pub const MAX: u8 = 3;

    pub fn new(module: u8) -> Result<Self, InvalidModule> {
        if (1..=Self::MAX).contains(&module) {
            Ok(Self(module))
        } else {
            Err(InvalidModule(module))
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("module {0} cannot be ranked on its own (expected 1 to {max})", max = SubModule::MAX)]
pub struct InvalidModule(pub u8);

/// The three ways a course turns grades into one average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Period,
    Module,
    Sub(SubModule),
}

impl From<FormulaCode> for Strategy {
    fn from(code: FormulaCode) -> Self {
        match code {
            FormulaCode::Cgs | FormulaCode::Cas | FormulaCode::Cfp => Strategy::Module,
            FormulaCode::Cho | FormulaCode::Cfo => Strategy::Period,
        }
    }
}

/// Result of running a strategy over one student's grades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub geral_average: f64,
    pub average_status: StudentAverageStatus,
    pub is_recovering: bool,
    pub is_second_season: bool,
    pub behavior_average_status: Vec<ConductAverage>,
    pub behaviors_count: usize,
    pub assessments: Vec<ResolvedScore>,
    pub assessments_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessments_per_period: Option<BTreeMap<u8, Vec<ResolvedScore>>>,
}

/// Run `strategy` over a student's resolved scores and conduct.
pub fn dispatch<S>(
    strategy: Strategy,
    scores: &[ResolvedScore],
    conduct: Option<&ResolvedConduct>,
    status: &S,
) -> GradeSummary
where
    S: StatusResolver + ?Sized,
{
    let (average, assessments, per_period) = match strategy {
        Strategy::Period => period::average(scores, conduct),
        Strategy::Module => module::average(scores, conduct),
        Strategy::Sub(module) => sub::average(scores, conduct, module),
    };
    summarize(average, assessments, per_period, conduct, status)
}

fn summarize<S>(
    average: f64,
    assessments: Vec<ResolvedScore>,
    assessments_per_period: Option<BTreeMap<u8, Vec<ResolvedScore>>>,
    conduct: Option<&ResolvedConduct>,
    status: &S,
) -> GradeSummary
where
    S: StatusResolver + ?Sized,
{
    let geral_average = round_to_thousandths(average);
    let is_recovering = assessments.iter().any(|score| score.is_recovering);
    let is_second_season = assessments
        .iter()
        .any(|score| score.status == AcademicStatus::SecondSeason);

    let mut average_status = status.resolve_status(geral_average, is_recovering);
    if is_second_season {
        average_status.status = AcademicStatus::SecondSeason;
    }

    let assessments_count = assessments.iter().map(ResolvedScore::marks_recorded).sum();
    let (behavior_average_status, behaviors_count) = conduct.map_or((Vec::new(), 0), |conduct| {
        (
            conduct.behavior_average_status.clone(),
            conduct.behaviors_count,
        )
    });

    GradeSummary {
        geral_average,
        average_status,
        is_recovering,
        is_second_season,
        behavior_average_status,
        behaviors_count,
        assessments,
        assessments_count,
        assessments_per_period,
    }
}

type StrategyOutput = (
    f64,
    Vec<ResolvedScore>,
    Option<BTreeMap<u8, Vec<ResolvedScore>>>,
);
