//! Grade aggregation and classification for course rankings.
//!
//! Raw discipline marks and monthly conduct marks are resolved by a
//! [`GradingPolicy`], reduced to one average by the strategy the course's
//! formula selects, and stored as a [`Classification`] per student.

pub mod classification;
pub mod domain;
pub mod formula;
pub mod policy;
pub mod ranking;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use classification::{Classification, ClassificationId, ClassificationSummary};
pub use domain::{
    AcademicStatus, Concept, ConductAverage, ConductRecord, CourseId, CourseProgram,
    DisciplineId, Enrollment, FormulaCode, PoleId, ResolvedConduct, ResolvedScore, ScoreRecord,
    ScoreResolution, StudentAverageStatus, StudentId, UnknownFormula, MONTHS_PER_YEAR,
};
pub use formula::{dispatch, GradeSummary, InvalidModule, Strategy, SubModule};
pub use policy::{
    ConceptBand, ConductResolver, ConductShape, GradingPolicy, PolicyConfig, PolicyError,
    ScoreResolver, StatusResolver, ThresholdPolicy,
};
pub use ranking::{
    AverageRanking, ExportError, RankedClassification, Ranking, RecordRenderer, Row,
    SheetExporter, RANKING_KEYS,
};
pub use repository::{
    ClassificationFilter, ClassificationRepository, CourseCatalog, GradeBook, Page,
    RepositoryError,
};
pub use service::{
    ClassificationError, ClassificationService, ErrorKind, GenerationMode, GenerationReport,
};
