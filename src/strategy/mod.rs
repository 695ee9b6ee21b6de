//! Update strategies for the search distribution.
//!
//! A strategy consumes the ranked population of a generation and adapts the
//! distribution's step size, and for [`Strategy::Cma`] its covariance
//! matrix. All strategies share the engine loop, sampling, evaluation, and
//! termination handling; they differ only in the constants computed at build
//! time and in the update rule applied after ranking.

pub(crate) mod cma;
pub(crate) mod sigma_sa;
pub(crate) mod success;

use serde::{Deserialize, Serialize};

use std::fmt;

pub use cma::CmaParameters;
pub use sigma_sa::SelfAdaptiveSigmaParameters;
pub use success::SuccessRuleParameters;

use crate::parameters::{FinalWeights, InitialWeights};

/// How the search distribution adapts between generations.
///
/// Selected with [`OptimizerOptions::strategy`][crate::OptimizerOptions::strategy].
/// The default value is `Cma`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Full covariance matrix adaptation (CMA-ES): weighted recombination,
    /// two evolution paths, rank-one plus rank-mu covariance updates, and
    /// cumulative step size adaptation. The most capable strategy and the
    /// right default for almost every problem.
    Cma,
    /// Mutative self-adaptation of the global step size: every candidate
    /// carries a lognormally drawn step size factor, and the factors of the
    /// selected candidates are recombined geometrically. The covariance
    /// matrix stays identity.
    SelfAdaptiveSigma,
    /// Success-rule step size control: the step size grows when more than a
    /// target fraction of the population improves on the previous
    /// generation's best value and shrinks otherwise. The covariance matrix
    /// stays identity.
    SuccessRule,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Cma
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Strategy::Cma => "cma",
            Strategy::SelfAdaptiveSigma => "self-adaptive-sigma",
            Strategy::SuccessRule => "success-rule",
        };
        write!(f, "{}", name)
    }
}

/// Constants of the configured update strategy, computed once at build time.
///
/// Obtained through
/// [`Parameters::strategy_parameters`][crate::parameters::Parameters::strategy_parameters].
#[derive(Clone, Debug)]
pub enum StrategyParameters {
    Cma(CmaParameters),
    SelfAdaptiveSigma(SelfAdaptiveSigmaParameters),
    SuccessRule(SuccessRuleParameters),
}

impl StrategyParameters {
    /// Computes the strategy constants and the matching final weight
    /// distribution
    pub(crate) fn new(
        kind: Strategy,
        dim: usize,
        lambda: usize,
        mu_eff: f64,
        initial_weights: InitialWeights,
    ) -> (Self, FinalWeights) {
        match kind {
            Strategy::Cma => {
                let (parameters, weights) =
                    CmaParameters::new(dim, lambda, mu_eff, initial_weights);
                (Self::Cma(parameters), weights)
            }
            Strategy::SelfAdaptiveSigma => (
                Self::SelfAdaptiveSigma(SelfAdaptiveSigmaParameters::new(dim)),
                initial_weights.finalize_positive(),
            ),
            Strategy::SuccessRule => (
                Self::SuccessRule(SuccessRuleParameters::new(dim)),
                initial_weights.finalize_positive(),
            ),
        }
    }

    /// Returns which strategy these constants belong to
    pub fn kind(&self) -> Strategy {
        match self {
            Self::Cma(_) => Strategy::Cma,
            Self::SelfAdaptiveSigma(_) => Strategy::SelfAdaptiveSigma,
            Self::SuccessRule(_) => Strategy::SuccessRule,
        }
    }
}
