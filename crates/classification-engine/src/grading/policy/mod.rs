//! Policy collaborators that turn raw marks into averages and statuses.
//!
//! The engine only depends on the three resolver traits. Cutoffs live in
//! [`PolicyConfig`] and are supplied by each program.

mod config;
mod thresholds;

pub use config::{ConceptBand, PolicyConfig, PolicyError};

use super::domain::{ResolvedConduct, ScoreResolution, StudentAverageStatus, MONTHS_PER_YEAR};

/// How monthly conduct marks are windowed before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConductShape {
    /// One average across every recorded month.
    Single,
    /// One average per period.
    Periods,
}

pub trait ScoreResolver: Send + Sync {
    fn resolve_score(
        &self,
        final_mark: f64,
        first_recovery: Option<f64>,
        second_recovery: Option<f64>,
        special_exam: Option<f64>,
    ) -> ScoreResolution;
}

pub trait ConductResolver: Send + Sync {
    fn resolve_conduct(
        &self,
        monthly_scores: &[Option<f64>; MONTHS_PER_YEAR],
        shape: ConductShape,
    ) -> ResolvedConduct;
}

pub trait StatusResolver: Send + Sync {
    fn resolve_status(&self, average: f64, is_recovering: bool) -> StudentAverageStatus;
}

/// Everything the engine needs from a grading policy.
pub trait GradingPolicy: ScoreResolver + ConductResolver + StatusResolver {}

impl<T> GradingPolicy for T where T: ScoreResolver + ConductResolver + StatusResolver {}

/// Table-driven policy backed by a validated [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    config: PolicyConfig,
}

impl ThresholdPolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl ScoreResolver for ThresholdPolicy {
    fn resolve_score(
        &self,
        final_mark: f64,
        first_recovery: Option<f64>,
        second_recovery: Option<f64>,
        special_exam: Option<f64>,
    ) -> ScoreResolution {
        thresholds::resolve_score(
            &self.config,
            final_mark,
            first_recovery,
            second_recovery,
            special_exam,
        )
    }
}

impl ConductResolver for ThresholdPolicy {
    fn resolve_conduct(
        &self,
        monthly_scores: &[Option<f64>; MONTHS_PER_YEAR],
        shape: ConductShape,
    ) -> ResolvedConduct {
        thresholds::resolve_conduct(&self.config, monthly_scores, shape)
    }
}

impl StatusResolver for ThresholdPolicy {
    fn resolve_status(&self, average: f64, is_recovering: bool) -> StudentAverageStatus {
        thresholds::resolve_status(&self.config, average, is_recovering)
    }
}
