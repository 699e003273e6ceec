use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::classification::ClassificationSummary;
use super::domain::FormulaCode;

/// Orders classification summaries for a course ranking.
pub trait Ranking: Send + Sync {
    fn rank(
        &self,
        summaries: Vec<ClassificationSummary>,
        formula: FormulaCode,
    ) -> Vec<ClassificationSummary>;
}

/// Highest average first; ties go to the older student, then to the student id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageRanking;

impl Ranking for AverageRanking {
    fn rank(
        &self,
        mut summaries: Vec<ClassificationSummary>,
        _formula: FormulaCode,
    ) -> Vec<ClassificationSummary> {
        summaries.sort_by(|a, b| {
            b.average
                .total_cmp(&a.average)
                .then_with(|| by_birthday(a, b))
                .then_with(|| a.student_id.cmp(&b.student_id))
        });
        summaries
    }
}

fn by_birthday(a: &ClassificationSummary, b: &ClassificationSummary) -> Ordering {
    match (a.student_birthday, b.student_birthday) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A summary with its 1-based position in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedClassification {
    pub position: usize,
    #[serde(flatten)]
    pub summary: ClassificationSummary,
}

pub(crate) fn with_positions(summaries: Vec<ClassificationSummary>) -> Vec<RankedClassification> {
    summaries
        .into_iter()
        .enumerate()
        .map(|(index, summary)| RankedClassification {
            position: index + 1,
            summary,
        })
        .collect()
}

pub type Row = BTreeMap<String, String>;

/// Writes a spreadsheet and returns the generated file name.
pub trait SheetExporter: Send + Sync {
    fn export(&self, keys: &[&str], rows: &[Row], sheet: &str) -> Result<String, ExportError>;
}

/// Renders an academic record document and returns its name.
pub trait RecordRenderer: Send + Sync {
    fn render(&self, header: &Row, rows: &[Row], title: &str) -> Result<String, ExportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export target unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub const RANKING_KEYS: [&str; 6] = ["position", "student", "pole", "average", "concept", "status"];

pub(crate) fn ranking_rows(ranked: &[RankedClassification]) -> Vec<Row> {
    ranked
        .iter()
        .map(|entry| {
            let summary = &entry.summary;
            let values = [
                entry.position.to_string(),
                summary.student_id.to_string(),
                summary.pole_id.to_string(),
                format!("{:.3}", summary.average),
                summary.concept.label().to_string(),
                summary.status.label().to_string(),
            ];
            RANKING_KEYS
                .iter()
                .map(|key| key.to_string())
                .zip(values)
                .collect()
        })
        .collect()
}
