use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier of a course offering.
    CourseId
);
identifier!(
    /// Identifier of an enrolled student.
    StudentId
);
identifier!(
    /// Identifier of a discipline taught within a course.
    DisciplineId
);
identifier!(
    /// Regional cohort a student belongs to inside a course.
    PoleId
);

/// Number of months covered by a conduct record.
pub const MONTHS_PER_YEAR: usize = 12;

/// Raw marks captured for one discipline of one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub discipline_id: DisciplineId,
    pub final_mark: Option<f64>,
    #[serde(default)]
    pub first_recovery: Option<f64>,
    #[serde(default)]
    pub second_recovery: Option<f64>,
    #[serde(default)]
    pub special_exam: Option<f64>,
}

/// Monthly conduct marks for one student in one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductRecord {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub monthly_scores: [Option<f64>; MONTHS_PER_YEAR],
}

/// Course formula codes accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaCode {
    #[serde(rename = "CGS")]
    Cgs,
    #[serde(rename = "CAS")]
    Cas,
    #[serde(rename = "CFP")]
    Cfp,
    #[serde(rename = "CHO")]
    Cho,
    #[serde(rename = "CFO")]
    Cfo,
}

impl FormulaCode {
    pub const fn code(self) -> &'static str {
        match self {
            FormulaCode::Cgs => "CGS",
            FormulaCode::Cas => "CAS",
            FormulaCode::Cfp => "CFP",
            FormulaCode::Cho => "CHO",
            FormulaCode::Cfo => "CFO",
        }
    }
}

impl fmt::Display for FormulaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Raised when a course carries a formula code the engine does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown formula code '{0}'")]
pub struct UnknownFormula(pub String);

impl FromStr for FormulaCode {
    type Err = UnknownFormula;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CGS" => Ok(FormulaCode::Cgs),
            "CAS" => Ok(FormulaCode::Cas),
            "CFP" => Ok(FormulaCode::Cfp),
            "CHO" => Ok(FormulaCode::Cho),
            "CFO" => Ok(FormulaCode::Cfo),
            _ => Err(UnknownFormula(value.to_string())),
        }
    }
}

/// Course definition as stored by the catalog.
///
/// `formula` keeps the raw code so that a course carrying an unknown code can
/// still be loaded and reported on; it is parsed when a formula is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgram {
    pub id: CourseId,
    pub name: String,
    pub formula: String,
    /// Conduct is averaged per period instead of once for the whole course.
    #[serde(default)]
    pub is_period: bool,
    #[serde(default)]
    pub modules: BTreeMap<DisciplineId, u8>,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

impl CourseProgram {
    pub fn formula_code(&self) -> Result<FormulaCode, UnknownFormula> {
        self.formula.parse()
    }

    pub fn module_of(&self, discipline: &DisciplineId) -> Option<u8> {
        self.modules.get(discipline).copied()
    }

    /// A course whose schedule ends before it starts cannot be registered.
    pub fn has_valid_schedule(&self) -> bool {
        match (self.starts_on, self.ends_on) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        }
    }
}

/// A student's seat in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub pole_id: PoleId,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
}

/// Outcome of a discipline, a conduct period, or a whole course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicStatus {
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "approved in recovery")]
    ApprovedInRecovery,
    #[serde(rename = "disapproved")]
    Disapproved,
    #[serde(rename = "second season")]
    SecondSeason,
}

impl AcademicStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AcademicStatus::Approved => "approved",
            AcademicStatus::ApprovedInRecovery => "approved in recovery",
            AcademicStatus::Disapproved => "disapproved",
            AcademicStatus::SecondSeason => "second season",
        }
    }
}

/// Qualitative tier attached to an average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    Excellent,
    Great,
    Good,
    Regular,
    Insufficient,
}

impl Concept {
    pub const fn label(self) -> &'static str {
        match self {
            Concept::Excellent => "excellent",
            Concept::Great => "great",
            Concept::Good => "good",
            Concept::Regular => "regular",
            Concept::Insufficient => "insufficient",
        }
    }
}

/// Per-discipline resolution as produced by the score policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResolution {
    pub average: f64,
    pub status: AcademicStatus,
    pub is_recovering: bool,
}

/// A score record after policy resolution, tagged with its module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedScore {
    pub discipline_id: DisciplineId,
    pub module: u8,
    pub final_mark: Option<f64>,
    pub first_recovery: Option<f64>,
    pub second_recovery: Option<f64>,
    pub special_exam: Option<f64>,
    pub average: f64,
    pub status: AcademicStatus,
    pub is_recovering: bool,
}

impl ResolvedScore {
    pub fn new(record: &ScoreRecord, module: u8, resolution: ScoreResolution) -> Self {
        Self {
            discipline_id: record.discipline_id.clone(),
            module,
            final_mark: record.final_mark,
            first_recovery: record.first_recovery,
            second_recovery: record.second_recovery,
            special_exam: record.special_exam,
            average: resolution.average,
            status: resolution.status,
            is_recovering: resolution.is_recovering,
        }
    }

    /// Marks that count as an assessment taken.
    pub fn marks_recorded(&self) -> usize {
        [self.final_mark, self.first_recovery, self.second_recovery]
            .iter()
            .filter(|mark| mark.is_some())
            .count()
    }
}

/// Average of one conduct window with its status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConductAverage {
    pub behavior_average: f64,
    pub status: AcademicStatus,
}

/// Conduct record after policy resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedConduct {
    pub behavior_average_status: Vec<ConductAverage>,
    pub behaviors_count: usize,
}

impl ResolvedConduct {
    pub fn has_entries(&self) -> bool {
        !self.behavior_average_status.is_empty()
    }
}

/// Concept and status for an aggregate average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAverageStatus {
    pub concept: Concept,
    pub status: AcademicStatus,
}
