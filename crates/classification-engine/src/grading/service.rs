use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::classification::{Classification, ClassificationId};
use super::domain::{
    CourseId, CourseProgram, DisciplineId, Enrollment, FormulaCode, ResolvedConduct,
    ResolvedScore, StudentId, UnknownFormula,
};
use super::formula::{dispatch, GradeSummary, InvalidModule, Strategy, SubModule};
use super::policy::{ConductShape, GradingPolicy};
use super::ranking::{
    ranking_rows, with_positions, ExportError, RankedClassification, Ranking, RecordRenderer, Row,
    SheetExporter, RANKING_KEYS,
};
use super::repository::{
    ClassificationFilter, ClassificationRepository, CourseCatalog, GradeBook, RepositoryError,
};
use crate::config::EngineConfig;

/// Service computing, persisting and ranking classifications.
pub struct ClassificationService<C, G, R> {
    catalog: Arc<C>,
    grades: Arc<G>,
    classifications: Arc<R>,
    policy: Arc<dyn GradingPolicy>,
    limiter: Arc<Semaphore>,
}

/// Which persistence path a batch run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Created,
    Updated,
}

/// Outcome of a course-wide generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub course_id: CourseId,
    pub formula: FormulaCode,
    pub mode: GenerationMode,
    pub classifications: Vec<Classification>,
}

/// One student's marks after policy resolution, ready for a strategy.
#[derive(Debug, Clone)]
struct StudentGrades {
    enrollment: Enrollment,
    scores: Vec<ResolvedScore>,
    conduct: Option<ResolvedConduct>,
}

impl StudentGrades {
    fn summarize(&self, strategy: Strategy, policy: &dyn GradingPolicy) -> GradeSummary {
        dispatch(strategy, &self.scores, self.conduct.as_ref(), policy)
    }
}

impl<C, G, R> ClassificationService<C, G, R>
where
    C: CourseCatalog + 'static,
    G: GradeBook + 'static,
    R: ClassificationRepository + 'static,
{
    pub fn new(
        catalog: Arc<C>,
        grades: Arc<G>,
        classifications: Arc<R>,
        policy: Arc<dyn GradingPolicy>,
    ) -> Self {
        Self::with_config(
            catalog,
            grades,
            classifications,
            policy,
            &EngineConfig::default(),
        )
    }

    pub fn with_config(
        catalog: Arc<C>,
        grades: Arc<G>,
        classifications: Arc<R>,
        policy: Arc<dyn GradingPolicy>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            catalog,
            grades,
            classifications,
            policy,
            limiter: Arc::new(Semaphore::new(
                config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS),
            )),
        }
    }

    /// Classify a single student for the first time.
    pub fn create(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Classification, ClassificationError> {
        let course = self.load_course(course_id)?;
        let enrollment = self.load_enrollment(course_id, student_id)?;

        if self.classifications.find(course_id, student_id)?.is_some() {
            return Err(ClassificationError::ClassificationExists {
                course: course_id.clone(),
                student: student_id.clone(),
            });
        }

        let strategy = Strategy::from(course.formula_code()?);
        let grades = resolve_student(self.grades.as_ref(), self.policy.as_ref(), &course, enrollment)?;
        let summary = grades.summarize(strategy, self.policy.as_ref());
        let classification = Classification::create(&summary, &grades.enrollment, None);

        let stored = self
            .classifications
            .create(classification)
            .map_err(|err| match err {
                RepositoryError::Conflict => ClassificationError::ClassificationExists {
                    course: course_id.clone(),
                    student: student_id.clone(),
                },
                other => other.into(),
            })?;

        debug!(course = %course_id, student = %student_id, average = stored.average(), "classification created");
        Ok(stored)
    }

    /// Recompute an existing classification and replace it in place.
    pub fn update(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Classification, ClassificationError> {
        let course = self.load_course(course_id)?;
        let missing = || ClassificationError::ClassificationMissing {
            course: course_id.clone(),
            student: student_id.clone(),
        };

        let existing = self
            .classifications
            .find(course_id, student_id)?
            .ok_or_else(missing)?;
        let enrollment = self.load_enrollment(course_id, student_id)?;

        let strategy = Strategy::from(course.formula_code()?);
        let grades = resolve_student(self.grades.as_ref(), self.policy.as_ref(), &course, enrollment)?;
        let summary = grades.summarize(strategy, self.policy.as_ref());
        let replacement =
            Classification::create(&summary, &grades.enrollment, Some(existing.id().clone()));

        self.classifications
            .save(replacement.clone())
            .map_err(|err| match err {
                RepositoryError::NotFound => missing(),
                other => other.into(),
            })?;

        debug!(course = %course_id, student = %student_id, average = replacement.average(), "classification updated");
        Ok(replacement)
    }

    /// Classify every enrolled student of a course in one batch.
    ///
    /// Students are resolved concurrently and the batch is only persisted when
    /// every one of them succeeded.
    pub async fn generate(
        &self,
        course_id: &CourseId,
    ) -> Result<GenerationReport, ClassificationError> {
        let course = Arc::new(self.load_course(course_id)?);
        let enrollments = self.catalog.enrolled_students(course_id)?;
        info!(course = %course_id, students = enrollments.len(), "generating classifications");

        let resolved = self.resolve_batch(&course, enrollments).await?;

        let formula = course.formula_code()?;
        let strategy = Strategy::from(formula);

        let existing = self
            .classifications
            .by_course(course_id, &ClassificationFilter::default())?;
        let mode = if existing.is_empty() {
            GenerationMode::Created
        } else {
            GenerationMode::Updated
        };
        let known: HashMap<StudentId, ClassificationId> = existing
            .into_iter()
            .map(|classification| {
                (
                    classification.student_id().clone(),
                    classification.id().clone(),
                )
            })
            .collect();

        let batch: Vec<Classification> = resolved
            .iter()
            .map(|grades| {
                let summary = grades.summarize(strategy, self.policy.as_ref());
                let existing_id = known.get(&grades.enrollment.student_id).cloned();
                Classification::create(&summary, &grades.enrollment, existing_id)
            })
            .collect();

        let persisted = match mode {
            GenerationMode::Created => self.classifications.create_many(batch.clone())?,
            GenerationMode::Updated => self.classifications.save_many(batch.clone())?,
        };

        info!(course = %course_id, formula = %formula, ?mode, persisted, "classification batch stored");

        Ok(GenerationReport {
            course_id: course_id.clone(),
            formula,
            mode,
            classifications: batch,
        })
    }

    /// Stored classifications of a course in ranking order.
    ///
    /// The pole narrows the listing; the page window applies to the ranked result.
    pub fn ranking<K>(
        &self,
        course_id: &CourseId,
        filter: &ClassificationFilter,
        ranking: &K,
    ) -> Result<Vec<RankedClassification>, ClassificationError>
    where
        K: Ranking + ?Sized,
    {
        let course = self.load_course(course_id)?;
        let formula = course.formula_code()?;

        let summaries = self
            .classifications
            .by_course(course_id, &ClassificationFilter::for_pole(filter.pole.clone()))?
            .iter()
            .map(Classification::summary)
            .collect();

        Ok(filter.paginate(with_positions(ranking.rank(summaries, formula))))
    }

    /// Rank students on a single module. Nothing is persisted.
    pub async fn module_ranking<K>(
        &self,
        course_id: &CourseId,
        module: u8,
        filter: &ClassificationFilter,
        ranking: &K,
    ) -> Result<Vec<RankedClassification>, ClassificationError>
    where
        K: Ranking + ?Sized,
    {
        let module = SubModule::new(module)?;
        let course = Arc::new(self.load_course(course_id)?);
        let formula = course.formula_code()?;

        let enrollments: Vec<Enrollment> = self
            .catalog
            .enrolled_students(course_id)?
            .into_iter()
            .filter(|enrollment| {
                filter
                    .pole
                    .as_ref()
                    .map_or(true, |pole| &enrollment.pole_id == pole)
            })
            .collect();

        let resolved = self.resolve_batch(&course, enrollments).await?;
        let summaries = resolved
            .iter()
            .map(|grades| {
                let summary = grades.summarize(Strategy::Sub(module), self.policy.as_ref());
                Classification::create(&summary, &grades.enrollment, None).summary()
            })
            .collect();

        Ok(filter.paginate(with_positions(ranking.rank(summaries, formula))))
    }

    /// Write the ranking to a spreadsheet and return the file name.
    pub fn export_ranking<K, E>(
        &self,
        course_id: &CourseId,
        filter: &ClassificationFilter,
        ranking: &K,
        exporter: &E,
    ) -> Result<String, ClassificationError>
    where
        K: Ranking + ?Sized,
        E: SheetExporter + ?Sized,
    {
        let ranked = self.ranking(course_id, filter, ranking)?;
        let rows = ranking_rows(&ranked);
        let sheet = match &filter.pole {
            Some(pole) => format!("ranking-{course_id}-{pole}"),
            None => format!("ranking-{course_id}"),
        };

        let file = exporter.export(&RANKING_KEYS, &rows, &sheet)?;
        info!(course = %course_id, rows = rows.len(), %file, "ranking exported");
        Ok(file)
    }

    /// Render the academic record of a classified student.
    pub fn academic_record<D>(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
        renderer: &D,
    ) -> Result<String, ClassificationError>
    where
        D: RecordRenderer + ?Sized,
    {
        let course = self.load_course(course_id)?;
        let classification = self
            .classifications
            .find(course_id, student_id)?
            .ok_or_else(|| ClassificationError::ClassificationMissing {
                course: course_id.clone(),
                student: student_id.clone(),
            })?;

        let mut header = Row::new();
        header.insert("course".to_string(), course.name.clone());
        header.insert("student".to_string(), student_id.to_string());
        header.insert("pole".to_string(), classification.pole_id().to_string());
        header.insert("average".to_string(), format!("{:.3}", classification.average()));
        header.insert("concept".to_string(), classification.concept().label().to_string());
        header.insert("status".to_string(), classification.status().label().to_string());
        if let Some(birthday) = classification.student_birthday() {
            header.insert("birthday".to_string(), birthday.format("%Y-%m-%d").to_string());
        }

        let rows: Vec<Row> = classification
            .assessments()
            .iter()
            .map(assessment_row)
            .collect();

        let document = renderer.render(&header, &rows, &format!("academic-record-{student_id}"))?;
        Ok(document)
    }

    fn load_course(&self, course_id: &CourseId) -> Result<CourseProgram, ClassificationError> {
        let course = self
            .catalog
            .course(course_id)?
            .ok_or_else(|| ClassificationError::CourseNotFound(course_id.clone()))?;
        if !course.has_valid_schedule() {
            return Err(ClassificationError::InvalidSchedule(course_id.clone()));
        }
        Ok(course)
    }

    fn load_enrollment(
        &self,
        course_id: &CourseId,
        student_id: &StudentId,
    ) -> Result<Enrollment, ClassificationError> {
        self.catalog
            .enrollment(course_id, student_id)?
            .ok_or_else(|| ClassificationError::StudentNotEnrolled {
                course: course_id.clone(),
                student: student_id.clone(),
            })
    }

    /// Resolve every enrolled student concurrently, then fail if any student failed.
    ///
    /// A student listed more than once is resolved from their first enrollment.
    async fn resolve_batch(
        &self,
        course: &Arc<CourseProgram>,
        enrollments: Vec<Enrollment>,
    ) -> Result<Vec<StudentGrades>, ClassificationError> {
        let listed = enrollments.len();
        let enrollments = distinct_students(enrollments);
        if enrollments.len() < listed {
            warn!(
                course = %course.id,
                duplicates = listed - enrollments.len(),
                "ignoring repeated enrollments"
            );
        }

        let tasks = enrollments.into_iter().map(|enrollment| {
            let grades = Arc::clone(&self.grades);
            let policy = Arc::clone(&self.policy);
            let limiter = Arc::clone(&self.limiter);
            let course = Arc::clone(course);
            tokio::spawn(async move {
                let _permit = limiter
                    .acquire_owned()
                    .await
                    .map_err(|_| ClassificationError::Interrupted)?;
                resolve_student(grades.as_ref(), policy.as_ref(), &course, enrollment)
            })
        });

        let mut resolved = Vec::new();
        let mut failures = Vec::new();
        for joined in join_all(tasks).await {
            match joined.map_err(ClassificationError::from).and_then(|result| result) {
                Ok(grades) => resolved.push(grades),
                Err(err) => failures.push(err),
            }
        }

        let failed = failures.len();
        if let Some(first) = failures.into_iter().next() {
            warn!(course = %course.id, failed, error = %first, "aborting classification batch");
            return Err(first);
        }
        Ok(resolved)
    }
}

fn distinct_students(enrollments: Vec<Enrollment>) -> Vec<Enrollment> {
    let mut seen = HashSet::new();
    enrollments
        .into_iter()
        .filter(|enrollment| seen.insert(enrollment.student_id.clone()))
        .collect()
}

fn resolve_student<G, P>(
    grades: &G,
    policy: &P,
    course: &CourseProgram,
    enrollment: Enrollment,
) -> Result<StudentGrades, ClassificationError>
where
    G: GradeBook + ?Sized,
    P: GradingPolicy + ?Sized,
{
    let records = grades.scores(&enrollment.student_id, &course.id)?;

    let modules = records
        .iter()
        .map(|record| {
            course.module_of(&record.discipline_id).ok_or_else(|| {
                ClassificationError::CourseHasNoModule {
                    course: course.id.clone(),
                    discipline: record.discipline_id.clone(),
                }
            })
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let scores = records
        .iter()
        .zip(modules)
        .map(|(record, module)| {
            let resolution = policy.resolve_score(
                record.final_mark.unwrap_or_default(),
                record.first_recovery,
                record.second_recovery,
                record.special_exam,
            );
            ResolvedScore::new(record, module, resolution)
        })
        .collect();

    let shape = if course.is_period {
        ConductShape::Periods
    } else {
        ConductShape::Single
    };
    let conduct = grades
        .conduct(&enrollment.student_id, &course.id)?
        .map(|record| policy.resolve_conduct(&record.monthly_scores, shape));

    Ok(StudentGrades {
        enrollment,
        scores,
        conduct,
    })
}

fn assessment_row(score: &ResolvedScore) -> Row {
    let mark = |value: Option<f64>| value.map(|mark| format!("{mark:.2}")).unwrap_or_default();
    BTreeMap::from([
        ("discipline".to_string(), score.discipline_id.to_string()),
        ("module".to_string(), score.module.to_string()),
        ("final_mark".to_string(), mark(score.final_mark)),
        ("first_recovery".to_string(), mark(score.first_recovery)),
        ("second_recovery".to_string(), mark(score.second_recovery)),
        ("special_exam".to_string(), mark(score.special_exam)),
        ("average".to_string(), format!("{:.3}", score.average)),
        ("status".to_string(), score.status.label().to_string()),
    ])
}

/// Broad category of a classification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidFormula,
    Invalid,
    Internal,
}

/// Error raised by the classification service.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("student {student} is not enrolled in course {course}")]
    StudentNotEnrolled { course: CourseId, student: StudentId },
    #[error("course {course} has no module for discipline {discipline}")]
    CourseHasNoModule {
        course: CourseId,
        discipline: DisciplineId,
    },
    #[error("student {student} is already classified in course {course}")]
    ClassificationExists { course: CourseId, student: StudentId },
    #[error("student {student} has no classification to update in course {course}")]
    ClassificationMissing { course: CourseId, student: StudentId },
    #[error("course {0} ends before it starts")]
    InvalidSchedule(CourseId),
    #[error("invalid formula: {0}")]
    InvalidFormula(#[from] UnknownFormula),
    #[error(transparent)]
    InvalidModule(#[from] InvalidModule),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("student computation did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("batch limiter closed before every student was resolved")]
    Interrupted,
}

impl ClassificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassificationError::CourseNotFound(_)
            | ClassificationError::StudentNotEnrolled { .. }
            | ClassificationError::CourseHasNoModule { .. }
            | ClassificationError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            ClassificationError::ClassificationExists { .. }
            | ClassificationError::ClassificationMissing { .. }
            | ClassificationError::InvalidSchedule(_)
            | ClassificationError::Repository(RepositoryError::Conflict) => ErrorKind::Conflict,
            ClassificationError::InvalidFormula(_) => ErrorKind::InvalidFormula,
            ClassificationError::InvalidModule(_) => ErrorKind::Invalid,
            ClassificationError::Repository(RepositoryError::Unavailable(_))
            | ClassificationError::Export(_)
            | ClassificationError::Task(_)
            | ClassificationError::Interrupted => ErrorKind::Internal,
        }
    }
}
