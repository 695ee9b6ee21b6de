//! Initialization of constant parameters of a run.

mod weights;

use nalgebra::DVector;

pub use weights::Weights;
pub(crate) use weights::{FinalWeights, InitialWeights};

use crate::mode::Mode;
use crate::strategy::{Strategy, StrategyParameters};
use crate::{termination, OptimizerOptions};

/// Parameters of the termination criteria
#[derive(Clone, Debug)]
pub(crate) struct TerminationParameters {
    /// Value for the MaxGenerations stop reason (disabled if `None`)
    pub max_generations: Option<usize>,
    /// Value for the FitnessTarget stop reason (disabled if `None`)
    pub fitness_target: Option<f64>,
    /// Value for the TolFun stop reason
    pub tol_fun: f64,
    /// Number of consecutive generations the fitness spread must stay below
    /// `tol_fun`
    pub tol_fun_window: usize,
    /// Value for the TolX stop reason
    pub tol_x: f64,
    /// Number of consecutive generations without improvement before the
    /// Stagnation stop reason fires
    pub stagnation_window: usize,
    /// Condition number limit for the IllConditioned stop reason
    pub tol_condition_cov: f64,
}

impl TerminationParameters {
    /// Initializes the `TerminationParameters` with the parameters set in `options`
    pub(crate) fn from_options(options: &OptimizerOptions) -> Self {
        let dimensions = options.dimensions;
        let lambda = options.population_size;
        let tol_x = options.tol_x.unwrap_or(1e-12 * options.initial_step_size);
        let tol_fun_window = options
            .tol_fun_window
            .unwrap_or_else(|| termination::default_tol_fun_window(dimensions, lambda));
        let stagnation_window = options
            .stagnation_window
            .unwrap_or_else(|| termination::default_stagnation_window(dimensions, lambda));

        Self {
            max_generations: options.max_generations,
            fitness_target: options.fitness_target,
            tol_fun: options.tol_fun,
            tol_fun_window,
            tol_x,
            stagnation_window,
            tol_condition_cov: options.tol_condition_cov,
        }
    }
}

/// Stores constant parameters for a run. Obtained by calling
/// [`Optimizer::parameters`][crate::Optimizer::parameters].
#[derive(Clone, Debug)]
pub struct Parameters {
    /// Optimization mode
    mode: Mode,
    /// Number of dimensions to search
    dim: usize,
    /// Population size
    lambda: usize,
    /// Number of individuals to select each generation
    mu: usize,
    /// Initial value for sigma
    initial_sigma: f64,
    /// Variance-effective selection mass
    mu_eff: f64,
    /// Individual weights
    weights: FinalWeights,
    /// Learning rate for the mean
    cm: f64,
    /// Constants of the configured update strategy
    strategy: StrategyParameters,
    /// Parameters of the termination criteria
    termination: TerminationParameters,
    /// Seed for the RNG
    seed: u64,
}

impl Parameters {
    /// Calculates and returns a new set of `Parameters`
    pub(crate) fn new(
        options: &OptimizerOptions,
        seed: u64,
        termination: TerminationParameters,
    ) -> Self {
        let dim = options.dimensions;
        let initial_weights = InitialWeights::new(options.population_size, options.weights);
        let mu = initial_weights.mu();
        let mu_eff = initial_weights.mu_eff();

        let (strategy, weights) = StrategyParameters::new(
            options.strategy,
            dim,
            options.population_size,
            mu_eff,
            initial_weights,
        );

        Parameters {
            mode: options.mode,
            dim,
            lambda: options.population_size,
            mu,
            initial_sigma: options.initial_step_size,
            mu_eff,
            weights,
            cm: options.cm,
            strategy,
            termination,
            seed,
        }
    }

    /// Calculates and returns a new set of `Parameters` from the provided options
    pub(crate) fn from_options(options: &OptimizerOptions, seed: u64) -> Self {
        Self::new(options, seed, TerminationParameters::from_options(options))
    }

    /// Returns the optimization mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the problem dimension `N`.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the population size `lambda`.
    pub fn lambda(&self) -> usize {
        self.lambda
    }

    /// Returns the selected population size `mu`.
    pub fn mu(&self) -> usize {
        self.mu
    }

    /// Returns the initial step size `sigma0`.
    pub fn initial_sigma(&self) -> f64 {
        self.initial_sigma
    }

    /// Returns the variance-effective selection mass `mu_eff`.
    pub fn mu_eff(&self) -> f64 {
        self.mu_eff
    }

    /// Returns the weights `w`.
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Returns the setting used for calculating the weights.
    pub fn weights_setting(&self) -> Weights {
        self.weights.setting()
    }

    /// Returns the learning rate for the mean update `cm`.
    pub fn cm(&self) -> f64 {
        self.cm
    }

    /// Returns which update strategy the run uses.
    pub fn strategy(&self) -> Strategy {
        self.strategy.kind()
    }

    /// Returns the constants of the configured update strategy.
    pub fn strategy_parameters(&self) -> &StrategyParameters {
        &self.strategy
    }

    /// Returns the value for the
    /// [`StopReason::MaxGenerations`][crate::StopReason::MaxGenerations] stop reason.
    pub fn max_generations(&self) -> Option<usize> {
        self.termination.max_generations
    }

    /// Returns the value for the
    /// [`StopReason::FitnessTarget`][crate::StopReason::FitnessTarget] stop reason.
    pub fn fitness_target(&self) -> Option<f64> {
        self.termination.fitness_target
    }

    /// Returns the value for the [`StopReason::TolFun`][crate::StopReason::TolFun] stop reason.
    pub fn tol_fun(&self) -> f64 {
        self.termination.tol_fun
    }

    /// Returns the number of consecutive generations the fitness spread must stay below
    /// [`tol_fun`][Self::tol_fun] for the run to count as converged.
    pub fn tol_fun_window(&self) -> usize {
        self.termination.tol_fun_window
    }

    /// Returns the value for the [`StopReason::TolX`][crate::StopReason::TolX] stop reason.
    pub fn tol_x(&self) -> f64 {
        self.termination.tol_x
    }

    /// Returns the number of consecutive generations without improvement before the
    /// [`StopReason::Stagnation`][crate::StopReason::Stagnation] stop reason fires.
    pub fn stagnation_window(&self) -> usize {
        self.termination.stagnation_window
    }

    /// Returns the condition number limit for the
    /// [`StopReason::IllConditioned`][crate::StopReason::IllConditioned] stop reason.
    pub fn tol_condition_cov(&self) -> f64 {
        self.termination.tol_condition_cov
    }

    /// Returns the seed for the RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
