use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{
    AcademicStatus, Concept, CourseId, Enrollment, PoleId, ResolvedScore, StudentId,
};
use super::formula::GradeSummary;

/// Surrogate identity of a stored classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationId(pub Uuid);

impl ClassificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClassificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Computed standing of one student in one course.
///
/// Instances are never edited; a recomputation builds a new value that reuses
/// the previous id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    id: ClassificationId,
    student_id: StudentId,
    course_id: CourseId,
    pole_id: PoleId,
    average: f64,
    status: AcademicStatus,
    concept: Concept,
    assessments: Vec<ResolvedScore>,
    assessments_count: usize,
    behaviors_count: usize,
    student_birthday: Option<NaiveDate>,
}

impl Classification {
    /// Build a classification from a grade summary. Passing `existing` keeps
    /// the identity of the record being replaced.
    pub fn create(
        summary: &GradeSummary,
        enrollment: &Enrollment,
        existing: Option<ClassificationId>,
    ) -> Self {
        Self {
            id: existing.unwrap_or_else(ClassificationId::generate),
            student_id: enrollment.student_id.clone(),
            course_id: enrollment.course_id.clone(),
            pole_id: enrollment.pole_id.clone(),
            average: summary.geral_average,
            status: summary.average_status.status,
            concept: summary.average_status.concept,
            assessments: summary.assessments.clone(),
            assessments_count: summary.assessments_count,
            behaviors_count: summary.behaviors_count,
            student_birthday: enrollment.birthday,
        }
    }

    pub fn id(&self) -> &ClassificationId {
        &self.id
    }

    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    pub fn pole_id(&self) -> &PoleId {
        &self.pole_id
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn status(&self) -> AcademicStatus {
        self.status
    }

    pub fn concept(&self) -> Concept {
        self.concept
    }

    pub fn assessments(&self) -> &[ResolvedScore] {
        &self.assessments
    }

    pub fn assessments_count(&self) -> usize {
        self.assessments_count
    }

    pub fn behaviors_count(&self) -> usize {
        self.behaviors_count
    }

    pub fn student_birthday(&self) -> Option<NaiveDate> {
        self.student_birthday
    }

    /// Whether the computed fields match, ignoring identity.
    pub fn same_outcome(&self, other: &Classification) -> bool {
        self.average.to_bits() == other.average.to_bits()
            && self.status == other.status
            && self.concept == other.concept
            && self.assessments_count == other.assessments_count
            && self.behaviors_count == other.behaviors_count
    }

    pub fn summary(&self) -> ClassificationSummary {
        ClassificationSummary {
            classification_id: self.id.clone(),
            student_id: self.student_id.clone(),
            pole_id: self.pole_id.clone(),
            average: self.average,
            status: self.status,
            concept: self.concept,
            student_birthday: self.student_birthday,
        }
    }
}

/// Ranking view of a classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub classification_id: ClassificationId,
    pub student_id: StudentId,
    pub pole_id: PoleId,
    pub average: f64,
    pub status: AcademicStatus,
    pub concept: Concept,
    pub student_birthday: Option<NaiveDate>,
}
