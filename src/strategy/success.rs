//! Success-rule control of the step size.

use crate::evaluation::EvaluatedPoint;
use crate::parameters::Parameters;
use crate::state::SearchState;

/// Constants of the success-rule step size strategy
#[derive(Clone, Debug)]
pub struct SuccessRuleParameters {
    /// Fraction of the population expected to improve on the previous
    /// generation when the step size is well calibrated
    target_ratio: f64,
    /// Damping parameter for step size changes
    damping: f64,
}

impl SuccessRuleParameters {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            target_ratio: 0.2,
            damping: 1.0 + dim as f64 / 2.0,
        }
    }

    /// Returns the targeted fraction of improving individuals per generation.
    pub fn target_ratio(&self) -> f64 {
        self.target_ratio
    }

    /// Returns the damping factor for step size changes.
    pub fn damping(&self) -> f64 {
        self.damping
    }
}

/// Grows or shrinks the step size based on the fraction of the population
/// that improved on the best value of the previous generation
///
/// The first generation has nothing to compare against and leaves the step
/// size unchanged.
pub(crate) fn update(
    state: &mut SearchState,
    parameters: &Parameters,
    strategy: &SuccessRuleParameters,
    individuals: &[EvaluatedPoint],
) {
    let previous_best = match state.previous_best_value {
        Some(value) => value,
        None => return,
    };

    let successes = individuals
        .iter()
        .filter(|individual| parameters.mode().is_better(individual.value(), previous_best))
        .count();
    let ratio = successes as f64 / individuals.len() as f64;

    let exponent =
        (ratio - strategy.target_ratio()) / (1.0 - strategy.target_ratio()) / strategy.damping();

    // The exponent is clamped to avoid overflowing the step size
    state.sigma *= exponent.min(1.0).exp();
}
