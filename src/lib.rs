mod cli;
mod infra;
mod report;

use classification_engine::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
