//! Mutative self-adaptation of the step size.

use crate::evaluation::EvaluatedPoint;
use crate::parameters::Parameters;
use crate::state::SearchState;

/// Constants of the self-adaptive step size strategy
#[derive(Clone, Debug)]
pub struct SelfAdaptiveSigmaParameters {
    /// Standard deviation of the lognormal perturbation applied to each
    /// candidate's step size factor
    tau: f64,
}

impl SelfAdaptiveSigmaParameters {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            tau: 1.0 / (2.0 * dim as f64).sqrt(),
        }
    }

    /// Returns the learning rate `tau` of the lognormal step size perturbations.
    pub fn tau(&self) -> f64 {
        self.tau
    }
}

/// Recombines the step size factors of the selected individuals into the
/// global step size
///
/// The factors were drawn at sampling time, so selection already favors
/// factors that produced good steps.
pub(crate) fn update(
    state: &mut SearchState,
    parameters: &Parameters,
    individuals: &[EvaluatedPoint],
) {
    // Weighted geometric mean of the mu best factors
    let log_factor = individuals
        .iter()
        .take(parameters.mu())
        .enumerate()
        .map(|(i, individual)| parameters.weights()[i] * individual.sigma_factor().ln())
        .sum::<f64>();

    // The exponent is clamped to avoid overflowing the step size
    state.sigma *= log_factor.min(1.0).exp();
}
