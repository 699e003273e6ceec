use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use classification_engine::config::EngineConfig;
use classification_engine::error::AppError;
use classification_engine::grading::{
    Classification, ClassificationFilter, ClassificationId, ClassificationRepository,
    ClassificationService, ConductRecord, CourseCatalog, CourseId, CourseProgram, Enrollment,
    ExportError, GradeBook, PolicyConfig, RecordRenderer, RepositoryError, Row, ScoreRecord,
    SheetExporter, StudentId, ThresholdPolicy,
};
use serde::Deserialize;

/// Grading tables and marks for one or more courses, read from a JSON file.
#[derive(Debug, Deserialize)]
pub(crate) struct Dataset {
    pub(crate) policy: PolicyConfig,
    #[serde(default)]
    pub(crate) courses: Vec<CourseProgram>,
    #[serde(default)]
    pub(crate) enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub(crate) scores: Vec<ScoreRecord>,
    #[serde(default)]
    pub(crate) conduct: Vec<ConductRecord>,
}

impl Dataset {
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

pub(crate) struct InMemoryCatalog {
    courses: HashMap<CourseId, CourseProgram>,
    enrollments: Vec<Enrollment>,
}

impl InMemoryCatalog {
    pub(crate) fn new(courses: Vec<CourseProgram>, enrollments: Vec<Enrollment>) -> Self {
        Self {
            courses: courses
                .into_iter()
                .map(|course| (course.id.clone(), course))
                .collect(),
            enrollments,
        }
    }
}

impl CourseCatalog for InMemoryCatalog {
    fn course(&self, id: &CourseId) -> Result<Option<CourseProgram>, RepositoryError> {
        Ok(self.courses.get(id).cloned())
    }

    fn enrolled_students(&self, course: &CourseId) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .enrollments
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
            .iter()
            .find(|enrollment| &enrollment.course_id == course && &enrollment.student_id == student)
            .cloned())
    }
}

pub(crate) struct InMemoryGradeBook {
    scores: Vec<ScoreRecord>,
    conduct: Vec<ConductRecord>,
}

impl InMemoryGradeBook {
    pub(crate) fn new(scores: Vec<ScoreRecord>, conduct: Vec<ConductRecord>) -> Self {
        Self { scores, conduct }
    }
}

impl GradeBook for InMemoryGradeBook {
    fn scores(
        &self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Vec<ScoreRecord>, RepositoryError> {
        Ok(self
            .scores
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
            .iter()
            .find(|record| &record.student_id == student && &record.course_id == course)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryClassificationRepository {
    records: Arc<Mutex<HashMap<ClassificationId, Classification>>>,
}

fn occupies(existing: &Classification, incoming: &Classification) -> bool {
    existing.course_id() == incoming.course_id() && existing.student_id() == incoming.student_id()
}

/// Whether two entries of the batch claim the same (course, student) pair.
fn repeats_pair(batch: &[Classification]) -> bool {
    batch
        .iter()
        .enumerate()
        .any(|(index, incoming)| batch[..index].iter().any(|earlier| occupies(earlier, incoming)))
}

impl ClassificationRepository for InMemoryClassificationRepository {
    fn find(
        &self,
        course: &CourseId,
        student: &StudentId,
    ) -> Result<Option<Classification>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| record.course_id() == course && record.student_id() == student)
            .cloned())
    }

    fn by_course(
        &self,
        course: &CourseId,
        filter: &ClassificationFilter,
    ) -> Result<Vec<Classification>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut listed: Vec<Classification> = guard
            .values()
            .filter(|record| record.course_id() == course && filter.matches(record))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.student_id().cmp(b.student_id()));
        Ok(filter.paginate(listed))
    }

    fn create(&self, classification: Classification) -> Result<Classification, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.values().any(|record| occupies(record, &classification)) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(classification.id().clone(), classification.clone());
        Ok(classification)
    }

    fn save(&self, classification: Classification) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(classification.id()) {
            guard.insert(classification.id().clone(), classification);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn create_many(&self, batch: Vec<Classification>) -> Result<usize, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let clash = repeats_pair(&batch)
            || batch
                .iter()
                .any(|incoming| guard.values().any(|record| occupies(record, incoming)));
        if clash {
            return Err(RepositoryError::Conflict);
        }
        let count = batch.len();
        guard.extend(
            batch
                .into_iter()
                .map(|classification| (classification.id().clone(), classification)),
        );
        Ok(count)
    }

    fn save_many(&self, batch: Vec<Classification>) -> Result<usize, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let clash = repeats_pair(&batch)
            || batch.iter().any(|incoming| {
                guard
                    .values()
                    .any(|record| occupies(record, incoming) && record.id() != incoming.id())
            });
        if clash {
            return Err(RepositoryError::Conflict);
        }
        let count = batch.len();
        guard.extend(
            batch
                .into_iter()
                .map(|classification| (classification.id().clone(), classification)),
        );
        Ok(count)
    }
}

/// Writes ranking sheets as CSV files under the export directory.
pub(crate) struct CsvSheetExporter {
    directory: PathBuf,
}

impl CsvSheetExporter {
    pub(crate) fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl SheetExporter for CsvSheetExporter {
    fn export(&self, keys: &[&str], rows: &[Row], sheet: &str) -> Result<String, ExportError> {
        fs::create_dir_all(&self.directory)?;
        let file_name = format!("{sheet}.csv");
        let mut writer =
            csv::Writer::from_path(self.directory.join(&file_name)).map_err(unavailable)?;

        writer.write_record(keys).map_err(unavailable)?;
        for row in rows {
            writer
                .write_record(
                    keys.iter()
                        .map(|key| row.get(*key).map(String::as_str).unwrap_or_default()),
                )
                .map_err(unavailable)?;
        }
        writer.flush()?;
        Ok(file_name)
    }
}

/// Writes an academic record as a two-part CSV: header fields, then one line
/// per assessment.
pub(crate) struct CsvRecordRenderer {
    directory: PathBuf,
}

impl CsvRecordRenderer {
    pub(crate) fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl RecordRenderer for CsvRecordRenderer {
    fn render(&self, header: &Row, rows: &[Row], title: &str) -> Result<String, ExportError> {
        fs::create_dir_all(&self.directory)?;
        let file_name = format!("{title}.csv");
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(self.directory.join(&file_name))
            .map_err(unavailable)?;

        for (field, value) in header {
            writer.write_record([field, value]).map_err(unavailable)?;
        }

        if let Some(first) = rows.first() {
            writer.write_record(first.keys()).map_err(unavailable)?;
            for row in rows {
                writer.write_record(row.values()).map_err(unavailable)?;
            }
        }
        writer.flush()?;
        Ok(file_name)
    }
}

fn unavailable(err: csv::Error) -> ExportError {
    ExportError::Unavailable(err.to_string())
}

pub(crate) type EngineService =
    ClassificationService<InMemoryCatalog, InMemoryGradeBook, InMemoryClassificationRepository>;

/// Wire the in-memory adapters around a loaded dataset.
pub(crate) fn build_service(dataset: Dataset, config: &EngineConfig) -> Result<EngineService, AppError> {
    let policy = ThresholdPolicy::new(dataset.policy)?;
    let catalog = InMemoryCatalog::new(dataset.courses, dataset.enrollments);
    let grades = InMemoryGradeBook::new(dataset.scores, dataset.conduct);

    Ok(ClassificationService::with_config(
        Arc::new(catalog),
        Arc::new(grades),
        Arc::new(InMemoryClassificationRepository::default()),
        Arc::new(policy),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use classification_engine::grading::{CourseId, RANKING_KEYS};

    const COHORT: &str =
        include_str!("../crates/classification-engine/tests/fixtures/cohort-2025.json");

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn dataset_parses_cohort_fixture() {
        let dataset: Dataset = serde_json::from_str(COHORT).expect("fixture parses");
        assert_eq!(dataset.courses.len(), 2);
        assert_eq!(dataset.enrollments.len(), 5);
        assert_eq!(dataset.conduct[0].monthly_scores[0], Some(6.542));
        assert!(dataset.enrollments[4].birthday.is_none());
    }

    #[test]
    fn dataset_rejects_unknown_concept() {
        let raw = r#"{
            "policy": {
                "passing_average": 5.0,
                "conduct_passing_average": 5.0,
                "months_per_period": 4,
                "concept_bands": [{ "minimum": 0.0, "concept": "legendary" }]
            }
        }"#;
        assert!(serde_json::from_str::<Dataset>(raw).is_err());
    }

    #[test]
    fn sheet_exporter_writes_keys_then_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = CsvSheetExporter::new(dir.path().join("exports"));
        let rows = vec![
            row(&[("position", "1"), ("student", "s-bia"), ("average", "7.500")]),
            row(&[("position", "2"), ("student", "s-ana"), ("average", "7.354")]),
        ];

        let file = exporter
            .export(&RANKING_KEYS, &rows, "ranking-cgs-2025")
            .expect("export succeeds");
        assert_eq!(file, "ranking-cgs-2025.csv");

        let written =
            fs::read_to_string(dir.path().join("exports").join(&file)).expect("sheet written");
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("position,student,pole,average,concept,status"));
        assert_eq!(lines.next(), Some("1,s-bia,,7.500,,"));
        assert_eq!(lines.next(), Some("2,s-ana,,7.354,,"));
    }

    #[test]
    fn record_renderer_writes_header_and_assessments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = CsvRecordRenderer::new(dir.path());
        let header = row(&[("average", "7.354"), ("student", "s-ana")]);
        let rows = vec![
            row(&[("discipline", "ethics"), ("average", "8.500")]),
            row(&[("discipline", "law"), ("average", "9.000")]),
        ];

        let file = renderer
            .render(&header, &rows, "academic-record-s-ana")
            .expect("render succeeds");

        let written = fs::read_to_string(dir.path().join(file)).expect("record written");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "average,7.354",
                "student,s-ana",
                "average,discipline",
                "8.500,ethics",
                "9.000,law",
            ]
        );
    }

    fn generated(course: &str) -> Vec<Classification> {
        let dataset: Dataset = serde_json::from_str(COHORT).expect("fixture parses");
        let service = build_service(dataset, &EngineConfig::default()).expect("service builds");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime
            .block_on(service.generate(&CourseId::from(course)))
            .expect("generate succeeds")
            .classifications
    }

    fn for_student<'a>(batch: &'a [Classification], student: &str) -> &'a Classification {
        batch
            .iter()
            .find(|classification| classification.student_id().0 == student)
            .expect("student classified")
    }

    #[test]
    fn create_many_rejects_a_pair_repeated_in_the_batch() {
        let first_run = generated("cgs-2025");
        let second_run = generated("cgs-2025");
        let repository = InMemoryClassificationRepository::default();

        let batch = vec![
            for_student(&first_run, "s-ana").clone(),
            for_student(&second_run, "s-ana").clone(),
        ];
        assert!(matches!(
            repository.create_many(batch),
            Err(RepositoryError::Conflict)
        ));
        assert!(repository
            .by_course(&CourseId::from("cgs-2025"), &ClassificationFilter::default())
            .expect("listing")
            .is_empty());
    }

    #[test]
    fn save_many_keeps_pairs_with_their_owner() {
        let first_run = generated("cgs-2025");
        let second_run = generated("cgs-2025");
        let repository = InMemoryClassificationRepository::default();
        repository
            .create_many(first_run.clone())
            .expect("first batch stored");

        let foreign = repository.save_many(second_run);
        assert!(matches!(foreign, Err(RepositoryError::Conflict)));

        let stored = repository
            .by_course(&CourseId::from("cgs-2025"), &ClassificationFilter::default())
            .expect("listing");
        assert_eq!(stored.len(), 3);
        assert!(stored
            .iter()
            .all(|record| first_run.iter().any(|original| original.id() == record.id())));

        repository
            .save_many(first_run)
            .expect("owner may replace its records");
    }

    #[test]
    fn repository_batches_are_all_or_nothing() {
        let classifications = generated("cgs-2025");
        let repository = InMemoryClassificationRepository::default();
        repository
            .create_many(classifications.clone())
            .expect("first batch stored");
        let replay = repository.create_many(classifications);
        assert!(matches!(replay, Err(RepositoryError::Conflict)));
        assert_eq!(
            repository
                .by_course(&CourseId::from("cgs-2025"), &ClassificationFilter::default())
                .expect("listing")
                .len(),
            3
        );
    }
}
