use std::env;
use std::fmt;
use std::path::PathBuf;

use tokio::sync::Semaphore;

/// Distinguishes runtime behavior for different stages of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let max_concurrency = env::var("CLASSIFY_MAX_CONCURRENCY")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENCY.to_string())
            .parse::<usize>()
            .ok()
            .filter(|value| (1..=Semaphore::MAX_PERMITS).contains(value))
            .ok_or(ConfigError::InvalidConcurrency)?;

        let export_dir = env::var("CLASSIFY_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("exports"));

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            engine: EngineConfig {
                max_concurrency,
                export_dir,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Settings controlling batch classification runs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on student computations in flight during a batch.
    pub max_concurrency: usize,
    pub export_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            export_dir: PathBuf::from("exports"),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidConcurrency,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidConcurrency => {
                write!(
                    f,
                    "CLASSIFY_MAX_CONCURRENCY must be between 1 and {}",
                    Semaphore::MAX_PERMITS
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
