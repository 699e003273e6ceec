use serde::{Deserialize, Serialize};

use super::super::domain::Concept;

/// Threshold tables consumed by [`super::ThresholdPolicy`].
///
/// None of these values have defaults: each program supplies its own tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub passing_average: f64,
    pub conduct_passing_average: f64,
    pub months_per_period: usize,
    pub concept_bands: Vec<ConceptBand>,
}

/// Lowest average that still earns `concept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConceptBand {
    pub minimum: f64,
    pub concept: Concept,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("at least one concept band is required")]
    MissingConceptBands,
    #[error("months per period must be between 1 and 12 (found {0})")]
    InvalidPeriodLength(usize),
    #[error("threshold '{0}' must be a finite number")]
    NonFiniteThreshold(&'static str),
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.concept_bands.is_empty() {
            return Err(PolicyError::MissingConceptBands);
        }
        if !(1..=12).contains(&self.months_per_period) {
            return Err(PolicyError::InvalidPeriodLength(self.months_per_period));
        }
        if !self.passing_average.is_finite() {
            return Err(PolicyError::NonFiniteThreshold("passing_average"));
        }
        if !self.conduct_passing_average.is_finite() {
            return Err(PolicyError::NonFiniteThreshold("conduct_passing_average"));
        }
        if self.concept_bands.iter().any(|band| !band.minimum.is_finite()) {
            return Err(PolicyError::NonFiniteThreshold("concept_bands.minimum"));
        }
        Ok(())
    }
}
