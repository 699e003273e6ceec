use classification_engine::config::AppConfig;
use classification_engine::error::AppError;
use classification_engine::grading::{
    AverageRanking, ClassificationFilter, CourseId, GenerationReport, Page, PoleId,
    RankedClassification, StudentId,
};
use tracing::info;

use crate::cli::{CourseArgs, ModuleRankingArgs, RankingArgs, RecordArgs};
use crate::infra::{build_service, CsvRecordRenderer, CsvSheetExporter, Dataset, EngineService};

fn load(args: &CourseArgs, config: &AppConfig) -> Result<(EngineService, CourseId), AppError> {
    let dataset = Dataset::from_path(&args.dataset)?;
    info!(
        dataset = %args.dataset.display(),
        courses = dataset.courses.len(),
        enrollments = dataset.enrollments.len(),
        "dataset loaded"
    );
    let service = build_service(dataset, &config.engine)?;
    Ok((service, CourseId::from(args.course.as_str())))
}

pub(crate) fn ranking_filter(
    pole: Option<&str>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> ClassificationFilter {
    ClassificationFilter {
        pole: pole.map(PoleId::from),
        page: limit.map(|limit| Page {
            offset: offset.unwrap_or(0),
            limit,
        }),
    }
}

pub(crate) async fn run_generate(args: CourseArgs, config: &AppConfig) -> Result<(), AppError> {
    let (service, course) = load(&args, config)?;
    let report = service.generate(&course).await?;
    render_generation(&report);
    Ok(())
}

pub(crate) async fn run_ranking(args: RankingArgs, config: &AppConfig) -> Result<(), AppError> {
    let RankingArgs {
        course: course_args,
        pole,
        offset,
        limit,
        export,
    } = args;

    let (service, course) = load(&course_args, config)?;
    service.generate(&course).await?;

    let filter = ranking_filter(pole.as_deref(), offset, limit);
    let ranked = service.ranking(&course, &filter, &AverageRanking)?;
    println!("Ranking for course {course}");
    render_ranking(&ranked);

    if export {
        let exporter = CsvSheetExporter::new(&config.engine.export_dir);
        let file = service.export_ranking(&course, &filter, &AverageRanking, &exporter)?;
        println!(
            "\nRanking exported to {}",
            config.engine.export_dir.join(file).display()
        );
    }
    Ok(())
}

pub(crate) async fn run_module_ranking(
    args: ModuleRankingArgs,
    config: &AppConfig,
) -> Result<(), AppError> {
    let (service, course) = load(&args.course, config)?;
    let filter = ranking_filter(args.pole.as_deref(), None, None);

    let ranked = service
        .module_ranking(&course, args.module, &filter, &AverageRanking)
        .await?;
    println!("Module {} ranking for course {course}", args.module);
    render_ranking(&ranked);
    Ok(())
}

pub(crate) fn run_record(args: RecordArgs, config: &AppConfig) -> Result<(), AppError> {
    let (service, course) = load(&args.course, config)?;
    let student = StudentId::from(args.student.as_str());

    let classification = service.create(&course, &student)?;
    let renderer = CsvRecordRenderer::new(&config.engine.export_dir);
    let document = service.academic_record(&course, &student, &renderer)?;

    println!(
        "{student}: average {:.3} ({}, {})",
        classification.average(),
        classification.concept().label(),
        classification.status().label()
    );
    println!(
        "Academic record written to {}",
        config.engine.export_dir.join(document).display()
    );
    Ok(())
}

fn render_generation(report: &GenerationReport) {
    println!(
        "Course {} classified with formula {} ({} students, {:?})",
        report.course_id,
        report.formula,
        report.classifications.len(),
        report.mode
    );
    for classification in &report.classifications {
        println!(
            "  - {:<12} {:<8} {:>7.3}  {:<13} {}",
            classification.student_id(),
            classification.pole_id(),
            classification.average(),
            classification.concept().label(),
            classification.status().label()
        );
    }
}

fn render_ranking(ranked: &[RankedClassification]) {
    if ranked.is_empty() {
        println!("  (no classified students)");
        return;
    }
    for entry in ranked {
        let summary = &entry.summary;
        println!(
            "  {:>3}. {:<12} {:<8} {:>7.3}  {:<13} {}",
            entry.position,
            summary.student_id,
            summary.pole_id,
            summary.average,
            summary.concept.label(),
            summary.status.label()
        );
    }
}
