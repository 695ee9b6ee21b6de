//! The covariance matrix adaptation strategy.

use nalgebra::DVector;

use crate::evaluation::EvaluatedPoint;
use crate::matrix::SquareMatrix;
use crate::parameters::{FinalWeights, InitialWeights, Parameters};
use crate::state::{SearchState, UpdateError};

/// Constants of the covariance matrix adaptation strategy
#[derive(Clone, Debug)]
pub struct CmaParameters {
    /// Learning rate for rank-one update cumulation
    cc: f64,
    /// Learning rate for rank-one update
    c1: f64,
    /// Learning rate for step size update
    cs: f64,
    /// Learning rate for rank-mu update
    cmu: f64,
    /// Damping parameter for step size update
    damp_s: f64,
    /// Expected norm of an `N(0, I)` draw
    chi_n: f64,
    /// Number of function evals between eigendecomposition updates
    evals_per_eigen: usize,
}

impl CmaParameters {
    /// Calculates the strategy constants and finalizes the weight
    /// distribution with the resulting learning rates
    pub(crate) fn new(
        dim: usize,
        lambda: usize,
        mu_eff: f64,
        initial_weights: InitialWeights,
    ) -> (Self, FinalWeights) {
        // Covariance matrix adaptation
        let a_cov = 2.0;
        let cc = (4.0 + mu_eff / dim as f64) / (dim as f64 + 4.0 + 2.0 * mu_eff / dim as f64);
        let c1 = a_cov / ((dim as f64 + 1.3).powi(2) + mu_eff);
        let cmu = (1.0 - c1).min(
            a_cov * (mu_eff - 2.0 + 1.0 / mu_eff)
                / ((dim as f64 + 2.0).powi(2) + a_cov * mu_eff / 2.0),
        );

        let weights = initial_weights.finalize(dim, c1, cmu);

        // Step size adaptation
        let cs = (mu_eff + 2.0) / (dim as f64 + mu_eff + 5.0);
        let damp_s = 1.0 + cs + 2.0 * (((mu_eff - 1.0) / (dim as f64 + 1.0)).sqrt() - 1.0).max(0.0);

        // Expectation of N(0, I)
        let chi_n = (dim as f64).sqrt()
            * (1.0 - 1.0 / (4.0 * dim as f64) + 1.0 / (21.0 * dim.pow(2) as f64));

        // Updating the eigendecomposition every generation is unnecessary and
        // inefficient for high dim
        let evals_per_eigen =
            (0.5 * dim as f64 * lambda as f64 / ((c1 + cmu) * dim.pow(2) as f64)) as usize;

        let parameters = Self {
            cc,
            c1,
            cs,
            cmu,
            damp_s,
            chi_n,
            evals_per_eigen,
        };

        (parameters, weights)
    }

    /// Returns the learning rate for rank-one update cumulation `cc`.
    pub fn cc(&self) -> f64 {
        self.cc
    }

    /// Returns the learning rate for the rank-one update `c1`.
    pub fn c1(&self) -> f64 {
        self.c1
    }

    /// Returns the learning rate for the step size update `cs`.
    pub fn cs(&self) -> f64 {
        self.cs
    }

    /// Returns the learning rate for the rank-mu update `cmu`.
    pub fn cmu(&self) -> f64 {
        self.cmu
    }

    /// Returns the damping factor for the step size update `damp_s`.
    pub fn damp_s(&self) -> f64 {
        self.damp_s
    }

    /// Returns the expected norm of an `N(0, I)` draw `chi_n`.
    pub fn chi_n(&self) -> f64 {
        self.chi_n
    }

    /// Returns the number of function evals between eigendecomposition updates.
    pub fn evals_per_eigen(&self) -> usize {
        self.evals_per_eigen
    }
}

/// Adapts the evolution paths, the step size, and the covariance matrix using
/// the ranked individuals of a fully evaluated generation
///
/// `yw` is the weighted recombination of the `mu` best steps, already applied
/// to the mean.
pub(crate) fn update(
    state: &mut SearchState,
    function_evals: usize,
    parameters: &Parameters,
    strategy: &CmaParameters,
    yw: &DVector<f64>,
    individuals: &[EvaluatedPoint],
) -> Result<(), UpdateError> {
    let dim = parameters.dim();
    let mu_eff = parameters.mu_eff();
    let weights = parameters.weights();
    let cc = strategy.cc();
    let c1 = strategy.c1();
    let cs = strategy.cs();
    let cmu = strategy.cmu();
    let damp_s = strategy.damp_s();
    let chi_n = strategy.chi_n();

    // Update evolution paths
    let new_path_sigma = (1.0 - cs) * &state.path_sigma
        + (cs * (2.0 - cs) * mu_eff).sqrt() * (state.cov.sqrt_inv() * yw);
    state.path_sigma = new_path_sigma;

    let hs = if (state.path_sigma.magnitude()
        / (1.0 - (1.0 - cs).powi(2 * (state.generation as i32 + 1))).sqrt())
        < (1.4 + 2.0 / (dim as f64 + 1.0)) * chi_n
    {
        1.0
    } else {
        0.0
    };

    let new_path_c =
        (1.0 - cc) * &state.path_c + hs * (cc * (2.0 - cc) * mu_eff).sqrt() * yw;
    state.path_c = new_path_c;

    // Update step size
    // The exponent is clamped to avoid overflowing the step size
    state.sigma *= ((cs / damp_s) * ((state.path_sigma.magnitude() / chi_n) - 1.0))
        .min(1.0)
        .exp();

    // Update covariance matrix
    // Negative weights are scaled down for steps far outside the distribution
    let weights_cov = weights
        .iter()
        .enumerate()
        .map(|(i, w)| {
            *w * if *w >= 0.0 {
                1.0
            } else {
                dim as f64 / (state.cov.sqrt_inv() * individuals[i].step()).magnitude().powi(2)
            }
        })
        .collect::<Vec<_>>();

    let delta_hs = (1.0 - hs) * cc * (2.0 - cc);
    let new_cov = (1.0 + c1 * delta_hs - c1 - cmu * weights.iter().sum::<f64>())
        * state.cov.cov()
        + c1 * &state.path_c * state.path_c.transpose()
        + cmu
            * weights_cov
                .into_iter()
                .enumerate()
                .map(|(i, wc)| wc * individuals[i].step() * individuals[i].step().transpose())
                .sum::<SquareMatrix<f64>>();

    let update_eigen = function_evals > state.last_eigen_update_evals + strategy.evals_per_eigen();

    if update_eigen {
        state.last_eigen_update_evals = function_evals;
    }

    state.cov.set_cov(new_cov, update_eigen)?;

    Ok(())
}
