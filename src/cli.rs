use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use classification_engine::config::AppConfig;
use classification_engine::error::AppError;
use classification_engine::telemetry;
use tracing::info;

use crate::report::{run_generate, run_module_ranking, run_ranking, run_record};

#[derive(Parser, Debug)]
#[command(
    name = "Academy Classification",
    about = "Compute course classifications and rankings from a grade dataset",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify every enrolled student of a course
    Generate(CourseArgs),
    /// Classify a course and list its ranking, optionally exporting it as CSV
    Ranking(RankingArgs),
    /// Rank a course on one module without storing classifications
    ModuleRanking(ModuleRankingArgs),
    /// Classify one student and write their academic record
    Record(RecordArgs),
}

#[derive(Args, Debug)]
pub(crate) struct CourseArgs {
    /// JSON dataset with the policy tables, courses, enrollments and marks
    #[arg(long)]
    pub(crate) dataset: PathBuf,
    /// Course identifier inside the dataset
    #[arg(long)]
    pub(crate) course: String,
}

#[derive(Args, Debug)]
pub(crate) struct RankingArgs {
    #[command(flatten)]
    pub(crate) course: CourseArgs,
    /// Only rank students of this pole
    #[arg(long)]
    pub(crate) pole: Option<String>,
    /// Skip this many ranked students (requires --limit)
    #[arg(long)]
    pub(crate) offset: Option<usize>,
    /// Maximum number of ranked students to list
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Write the ranking to CLASSIFY_EXPORT_DIR
    #[arg(long)]
    pub(crate) export: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ModuleRankingArgs {
    #[command(flatten)]
    pub(crate) course: CourseArgs,
    /// Module number (1 to 3)
    #[arg(long)]
    pub(crate) module: u8,
    /// Only rank students of this pole
    #[arg(long)]
    pub(crate) pole: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RecordArgs {
    #[command(flatten)]
    pub(crate) course: CourseArgs,
    /// Student identifier
    #[arg(long)]
    pub(crate) student: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    info!(environment = ?config.environment, "classification driver starting");

    match cli.command {
        Command::Generate(args) => run_generate(args, &config).await,
        Command::Ranking(args) => run_ranking(args, &config).await,
        Command::ModuleRanking(args) => run_module_ranking(args, &config).await,
        Command::Record(args) => run_record(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_module_ranking_flags() {
        let cli = Cli::try_parse_from([
            "academy-classification",
            "module-ranking",
            "--dataset",
            "cohort.json",
            "--course",
            "cfo-2025",
            "--module",
            "3",
            "--pole",
            "south",
        ])
        .expect("arguments parse");

        match cli.command {
            Command::ModuleRanking(args) => {
                assert_eq!(args.course.course, "cfo-2025");
                assert_eq!(args.module, 3);
                assert_eq!(args.pole.as_deref(), Some("south"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
