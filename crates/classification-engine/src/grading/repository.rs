use serde::{Deserialize, Serialize};

use super::classification::Classification;
use super::domain::{ConductRecord, CourseId, CourseProgram, Enrollment, PoleId, ScoreRecord, StudentId};

/// Read access to courses and the students enrolled in them.
pub trait CourseCatalog: Send + Sync {
    fn course(&self, id: &CourseId) -> Result<Option<CourseProgram>, RepositoryError>;
    fn enrolled_students(&self, course: &CourseId) -> Result<Vec<Enrollment>, RepositoryError>;
    fn enrollment(
        &self,
        course: &CourseId,
        student: &StudentId,
    ) -> Result<Option<Enrollment>, RepositoryError>;
}

/// Read access to the raw marks of a student.
pub trait GradeBook: Send + Sync {
    fn scores(
        &self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Vec<ScoreRecord>, RepositoryError>;
    fn conduct(
        &self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Option<ConductRecord>, RepositoryError>;
}

/// Storage for computed classifications.
///
/// `create_many` and `save_many` must apply the whole batch or nothing.
pub trait ClassificationRepository: Send + Sync {
    fn find(
        &self,
        course: &CourseId,
        student: &StudentId,
    ) -> Result<Option<Classification>, RepositoryError>;
    fn by_course(
        &self,
        course: &CourseId,
        filter: &ClassificationFilter,
    ) -> Result<Vec<Classification>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the student already has one.
    fn create(&self, classification: Classification) -> Result<Classification, RepositoryError>;
    /// Replace the record carrying the same id.
    fn save(&self, classification: Classification) -> Result<(), RepositoryError>;
    fn create_many(&self, batch: Vec<Classification>) -> Result<usize, RepositoryError>;
    /// Replace records by id; ids the store does not know are inserted.
    fn save_many(&self, batch: Vec<Classification>) -> Result<usize, RepositoryError>;
}

/// Narrowing applied when listing a course's classifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationFilter {
    pub pole: Option<PoleId>,
    pub page: Option<Page>,
}

impl ClassificationFilter {
    pub fn for_pole(pole: Option<PoleId>) -> Self {
        Self { pole, page: None }
    }

    pub fn matches(&self, classification: &Classification) -> bool {
        self.pole
            .as_ref()
            .map_or(true, |pole| classification.pole_id() == pole)
    }

    /// Apply the page window to an already filtered, ordered listing.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.page {
            Some(page) => items
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect(),
            None => items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
