//! Variable state of a run and updating of that state.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::evaluation::EvaluatedPoint;
use crate::matrix::{CovarianceMatrix, DegenerateCovarianceError};
use crate::parameters::Parameters;
use crate::strategy::{self, StrategyParameters};

/// Bounds on the step size; a step size outside this range means the run has
/// become numerically unstable
const SIGMA_MIN: f64 = 1e-290;
const SIGMA_MAX: f64 = 1e290;

/// Stores the variable state of a run and handles updating it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    /// The number of generations that have been fully completed
    pub(crate) generation: usize,
    /// The distribution mean
    pub(crate) mean: DVector<f64>,
    /// The distribution covariance matrix and its decomposition
    pub(crate) cov: CovarianceMatrix,
    /// The distribution step size
    pub(crate) sigma: f64,
    /// Evolution path of the mean used to update the covariance matrix
    pub(crate) path_c: DVector<f64>,
    /// Evolution path of the mean used to update the step size
    pub(crate) path_sigma: DVector<f64>,
    /// The last time the eigendecomposition was updated, in function evals
    pub(crate) last_eigen_update_evals: usize,
    /// Best function value of the last fully evaluated generation
    pub(crate) previous_best_value: Option<f64>,
}

impl SearchState {
    /// Initializes the variable state of a run
    pub(crate) fn new(initial_mean: DVector<f64>, initial_sigma: f64) -> Self {
        let dim = initial_mean.len();

        Self {
            generation: 0,
            mean: initial_mean,
            cov: CovarianceMatrix::new(dim),
            sigma: initial_sigma,
            path_c: DVector::zeros(dim),
            path_sigma: DVector::zeros(dim),
            last_eigen_update_evals: 0,
            previous_best_value: None,
        }
    }

    /// Updates the variable state using the provided individuals, which must
    /// be a fully evaluated generation ranked from best to worst
    ///
    /// `function_evals` is the total number of evaluations consumed so far,
    /// used to decide when to refresh the eigendecomposition.
    pub(crate) fn update(
        &mut self,
        function_evals: usize,
        parameters: &Parameters,
        individuals: &[EvaluatedPoint],
    ) -> Result<(), UpdateError> {
        let mu = parameters.mu();
        let cm = parameters.cm();

        // New mean through weighted recombination
        // Only the mu best individuals are used even if there are lambda
        // weights
        let yw = individuals
            .iter()
            .take(mu)
            .enumerate()
            .map(|(i, individual)| individual.step() * parameters.weights()[i])
            .sum::<DVector<f64>>();
        self.mean = &self.mean + &(cm * self.sigma * &yw);

        match parameters.strategy_parameters() {
            StrategyParameters::Cma(p) => {
                strategy::cma::update(self, function_evals, parameters, p, &yw, individuals)?;
            }
            StrategyParameters::SelfAdaptiveSigma(_) => {
                strategy::sigma_sa::update(self, parameters, individuals);
            }
            StrategyParameters::SuccessRule(p) => {
                strategy::success::update(self, parameters, p, individuals);
            }
        }

        let finite = self.sigma.is_finite()
            && (SIGMA_MIN..=SIGMA_MAX).contains(&self.sigma)
            && self.mean.iter().all(|x| x.is_finite())
            && self.path_c.iter().all(|x| x.is_finite())
            && self.path_sigma.iter().all(|x| x.is_finite());

        if !finite {
            return Err(UpdateError::NumericalInstability);
        }

        self.generation += 1;
        self.previous_best_value = Some(individuals[0].value());

        Ok(())
    }

    /// Returns the number of generations that have been fully completed.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the current mean of the distribution.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Returns the current covariance matrix of the distribution.
    pub fn covariance(&self) -> &CovarianceMatrix {
        &self.cov
    }

    /// Returns the current step size of the distribution.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Returns the current evolution path of the mean used for the covariance
    /// matrix update.
    pub fn path_c(&self) -> &DVector<f64> {
        &self.path_c
    }

    /// Returns the current evolution path of the mean used for the step size
    /// update.
    pub fn path_sigma(&self) -> &DVector<f64> {
        &self.path_sigma
    }

    /// Returns the current axis ratio of the distribution.
    pub fn axis_ratio(&self) -> f64 {
        self.cov.axis_ratio()
    }
}

/// An error produced while updating the state, terminating the run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdateError {
    /// The covariance matrix can no longer be decomposed into a valid
    /// sampling transform
    DegenerateCovariance,
    /// The step size, mean, or an evolution path became non-finite or left
    /// its working range
    NumericalInstability,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UpdateError::DegenerateCovariance => write!(
                f,
                "the covariance matrix could not be decomposed into a valid sampling transform"
            ),
            UpdateError::NumericalInstability => write!(
                f,
                "the search state became non-finite or left its working range"
            ),
        }
    }
}

impl std::error::Error for UpdateError {}

impl From<DegenerateCovarianceError> for UpdateError {
    fn from(_: DegenerateCovarianceError) -> Self {
        Self::DegenerateCovariance
    }
}
