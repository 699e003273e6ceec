use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::grading::classification::Classification;
use crate::grading::domain::{
    AcademicStatus, Concept, ConductAverage, ConductRecord, CourseId, CourseProgram, DisciplineId,
    Enrollment, PoleId, ResolvedConduct, ResolvedScore, ScoreRecord, StudentId,
};
use crate::grading::policy::{ConceptBand, PolicyConfig, ThresholdPolicy};
use crate::grading::ranking::{ExportError, RecordRenderer, Row, SheetExporter};
use crate::grading::repository::{
    ClassificationFilter, ClassificationRepository, CourseCatalog, GradeBook, RepositoryError,
};
use crate::grading::service::ClassificationService;

pub(super) fn policy_config() -> PolicyConfig {
    PolicyConfig {
        passing_average: 5.0,
        conduct_passing_average: 5.0,
        months_per_period: 4,
        concept_bands: vec![
            ConceptBand {
                minimum: 9.5,
                concept: Concept::Excellent,
            },
            ConceptBand {
                minimum: 8.5,
                concept: Concept::Great,
            },
            ConceptBand {
                minimum: 7.0,
                concept: Concept::Good,
            },
            ConceptBand {
                minimum: 5.0,
                concept: Concept::Regular,
            },
            ConceptBand {
                minimum: 0.0,
                concept: Concept::Insufficient,
            },
        ],
    }
}

pub(super) fn policy() -> ThresholdPolicy {
    ThresholdPolicy::new(policy_config()).expect("test policy is valid")
}

pub(super) fn resolved(discipline: &str, module: u8, average: f64) -> ResolvedScore {
    ResolvedScore {
        discipline_id: DisciplineId::from(discipline),
        module,
        final_mark: Some(average),
        first_recovery: None,
        second_recovery: None,
        special_exam: None,
        average,
        status: AcademicStatus::Approved,
        is_recovering: false,
    }
}

pub(super) fn conduct(averages: &[f64]) -> ResolvedConduct {
    ResolvedConduct {
        behavior_average_status: averages
            .iter()
            .map(|&behavior_average| ConductAverage {
                behavior_average,
                status: AcademicStatus::Approved,
            })
            .collect(),
        behaviors_count: averages.len() * 4,
    }
}

pub(super) fn course_id() -> CourseId {
    CourseId::from("course-2025")
}

pub(super) fn course(formula: &str, is_period: bool) -> CourseProgram {
    let modules = BTreeMap::from([
        (DisciplineId::from("tactics"), 1),
        (DisciplineId::from("law"), 2),
        (DisciplineId::from("ethics"), 3),
        (DisciplineId::from("capstone"), 4),
    ]);
    CourseProgram {
        id: course_id(),
        name: "Officer Training 2025".to_string(),
        formula: formula.to_string(),
        is_period,
        modules,
        starts_on: NaiveDate::from_ymd_opt(2025, 2, 3),
        ends_on: NaiveDate::from_ymd_opt(2025, 12, 12),
    }
}

pub(super) fn enrollment(student: &str, pole: &str) -> Enrollment {
    Enrollment {
        student_id: StudentId::from(student),
        course_id: course_id(),
        pole_id: PoleId::from(pole),
        birthday: NaiveDate::from_ymd_opt(1995, 5, 17),
    }
}

pub(super) fn score(student: &str, discipline: &str, final_mark: f64) -> ScoreRecord {
    ScoreRecord {
        student_id: StudentId::from(student),
        course_id: course_id(),
        discipline_id: DisciplineId::from(discipline),
        final_mark: Some(final_mark),
        first_recovery: None,
        second_recovery: None,
        special_exam: None,
    }
}

pub(super) fn conduct_record(student: &str, monthly: [Option<f64>; 12]) -> ConductRecord {
    ConductRecord {
        student_id: StudentId::from(student),
        course_id: course_id(),
        monthly_scores: monthly,
    }
}

#[derive(Default)]
pub(super) struct MemoryCatalog {
    courses: Mutex<HashMap<CourseId, CourseProgram>>,
    enrollments: Mutex<Vec<Enrollment>>,
}

impl MemoryCatalog {
    pub(super) fn with_course(course: CourseProgram) -> Self {
        let catalog = Self::default();
        catalog
            .courses
            .lock()
            .expect("lock")
            .insert(course.id.clone(), course);
        catalog
    }

    pub(super) fn enroll(&self, enrollment: Enrollment) {
        self.enrollments.lock().expect("lock").push(enrollment);
    }
}

impl CourseCatalog for MemoryCatalog {
    fn course(&self, id: &CourseId) -> Result<Option<CourseProgram>, RepositoryError> {
        Ok(self.courses.lock().expect("lock").get(id).cloned())
    }

    fn enrolled_students(&self, course: &CourseId) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .enrollments
            .lock()
            .expect("lock")
            .iter()
            .filter(|enrollment| &enrollment.course_id == course)
            .cloned()
            .collect())
    }

    fn enrollment(
        &self,
        course: &CourseId,
        student: &StudentId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self
            .enrollments
            .lock()
            .expect("lock")
            .iter()
            .find(|enrollment| &enrollment.course_id == course && &enrollment.student_id == student)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryGradeBook {
    scores: Mutex<Vec<ScoreRecord>>,
    conduct: Mutex<Vec<ConductRecord>>,
}

impl MemoryGradeBook {
    pub(super) fn record(&self, score: ScoreRecord) {
        self.scores.lock().expect("lock").push(score);
    }

    pub(super) fn record_conduct(&self, conduct: ConductRecord) {
        self.conduct.lock().expect("lock").push(conduct);
    }

    pub(super) fn correct_final_mark(&self, student: &str, discipline: &str, mark: f64) {
        let mut guard = self.scores.lock().expect("lock");
        for score in guard.iter_mut().filter(|score| {
            score.student_id.0 == student && score.discipline_id.0 == discipline
        }) {
            score.final_mark = Some(mark);
        }
    }
}

impl GradeBook for MemoryGradeBook {
    fn scores(
        &self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Vec<ScoreRecord>, RepositoryError> {
        Ok(self
            .scores
            .lock()
            .expect("lock")
            .iter()
            .filter(|score| &score.student_id == student && &score.course_id == course)
            .cloned()
            .collect())
    }

    fn conduct(
        &self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Option<ConductRecord>, RepositoryError> {
        Ok(self
            .conduct
            .lock()
            .expect("lock")
            .iter()
            .find(|record| &record.student_id == student && &record.course_id == course)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryClassifications {
    records: Mutex<Vec<Classification>>,
    bulk_creates: AtomicUsize,
    bulk_saves: AtomicUsize,
}

impl MemoryClassifications {
    pub(super) fn all(&self) -> Vec<Classification> {
        self.records.lock().expect("lock").clone()
    }

    pub(super) fn bulk_creates(&self) -> usize {
        self.bulk_creates.load(Ordering::SeqCst)
    }

    pub(super) fn bulk_saves(&self) -> usize {
        self.bulk_saves.load(Ordering::SeqCst)
    }
}

fn same_pair(a: &Classification, b: &Classification) -> bool {
    a.course_id() == b.course_id() && a.student_id() == b.student_id()
}

fn repeats_pair(batch: &[Classification]) -> bool {
    batch
        .iter()
        .enumerate()
        .any(|(index, incoming)| batch[..index].iter().any(|earlier| same_pair(earlier, incoming)))
}

impl ClassificationRepository for MemoryClassifications {
    fn find(
        &self,
        course: &CourseId,
        student: &StudentId,
    ) -> Result<Option<Classification>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .iter()
            .find(|record| record.course_id() == course && record.student_id() == student)
            .cloned())
    }

    fn by_course(
        &self,
        course: &CourseId,
        filter: &ClassificationFilter,
    ) -> Result<Vec<Classification>, RepositoryError> {
        let listed = self
            .records
            .lock()
            .expect("lock")
            .iter()
            .filter(|record| record.course_id() == course && filter.matches(record))
            .cloned()
            .collect();
        Ok(filter.paginate(listed))
    }

    fn create(&self, classification: Classification) -> Result<Classification, RepositoryError> {
        let mut guard = self.records.lock().expect("lock");
        if guard.iter().any(|record| same_pair(record, &classification)) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(classification.clone());
        Ok(classification)
    }

    fn save(&self, classification: Classification) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("lock");
        let slot = guard
            .iter_mut()
            .find(|record| record.id() == classification.id())
            .ok_or(RepositoryError::NotFound)?;
        *slot = classification;
        Ok(())
    }

    fn create_many(&self, batch: Vec<Classification>) -> Result<usize, RepositoryError> {
        self.bulk_creates.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.records.lock().expect("lock");
        let clash = repeats_pair(&batch)
            || batch
                .iter()
                .any(|incoming| guard.iter().any(|record| same_pair(record, incoming)));
        if clash {
            return Err(RepositoryError::Conflict);
        }
        let count = batch.len();
        guard.extend(batch);
        Ok(count)
    }

    fn save_many(&self, batch: Vec<Classification>) -> Result<usize, RepositoryError> {
        self.bulk_saves.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.records.lock().expect("lock");
        let clash = repeats_pair(&batch)
            || batch.iter().any(|incoming| {
                guard
                    .iter()
                    .any(|record| same_pair(record, incoming) && record.id() != incoming.id())
            });
        if clash {
            return Err(RepositoryError::Conflict);
        }
        let count = batch.len();
        for incoming in batch {
            match guard.iter_mut().find(|record| record.id() == incoming.id()) {
                Some(slot) => *slot = incoming,
                None => guard.push(incoming),
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub(super) struct MemoryExporter {
    pub(super) sheets: Mutex<Vec<(Vec<String>, Vec<Row>, String)>>,
}

impl SheetExporter for MemoryExporter {
    fn export(&self, keys: &[&str], rows: &[Row], sheet: &str) -> Result<String, ExportError> {
        self.sheets.lock().expect("lock").push((
            keys.iter().map(|key| key.to_string()).collect(),
            rows.to_vec(),
            sheet.to_string(),
        ));
        Ok(format!("{sheet}.xlsx"))
    }
}

#[derive(Default)]
pub(super) struct MemoryRenderer {
    pub(super) documents: Mutex<Vec<(Row, Vec<Row>)>>,
}

impl RecordRenderer for MemoryRenderer {
    fn render(&self, header: &Row, rows: &[Row], title: &str) -> Result<String, ExportError> {
        self.documents
            .lock()
            .expect("lock")
            .push((header.clone(), rows.to_vec()));
        Ok(format!("{title}.pdf"))
    }
}

pub(super) type TestService =
    ClassificationService<MemoryCatalog, MemoryGradeBook, MemoryClassifications>;

pub(super) struct Harness {
    pub(super) catalog: Arc<MemoryCatalog>,
    pub(super) grades: Arc<MemoryGradeBook>,
    pub(super) classifications: Arc<MemoryClassifications>,
    pub(super) service: TestService,
}

/// Course with two enrolled students holding marks in modules one to three.
pub(super) fn harness(course: CourseProgram) -> Harness {
    let catalog = Arc::new(MemoryCatalog::with_course(course));
    let grades = Arc::new(MemoryGradeBook::default());
    let classifications = Arc::new(MemoryClassifications::default());

    catalog.enroll(enrollment("s-ana", "north"));
    catalog.enroll(enrollment("s-bia", "south"));

    for (student, marks) in [("s-ana", [7.0, 9.0, 8.5]), ("s-bia", [6.0, 7.5, 9.0])] {
        for (discipline, mark) in ["tactics", "law", "ethics"].into_iter().zip(marks) {
            grades.record(score(student, discipline, mark));
        }
    }

    let service = ClassificationService::new(
        catalog.clone(),
        grades.clone(),
        classifications.clone(),
        Arc::new(policy()),
    );

    Harness {
        catalog,
        grades,
        classifications,
        service,
    }
}
