//! Configuration of a run. See [`OptimizerOptions`] for full documentation.

use nalgebra::DVector;

use std::error::Error;
use std::fmt;
use std::ops::RangeInclusive;

use crate::evaluation::{FailurePolicy, InvalidFitnessPolicy};
use crate::mode::Mode;
use crate::parameters::Weights;
use crate::strategy::Strategy;
use crate::{Checkpoint, Optimizer, ResumeError};

/// The default initial step size.
pub(crate) const DEFAULT_INITIAL_STEP_SIZE: f64 = 0.5;
/// The smallest population size for which the selection weights are usable.
pub(crate) const MIN_POPULATION_SIZE: usize = 4;
/// The default minimum number of evaluations between printed progress lines.
pub const DEFAULT_PRINT_GAP_EVALS: usize = 200;

/// Returns the default population size for `dimensions`.
pub(crate) fn default_population_size(dimensions: usize) -> usize {
    4 + 3 * (dimensions as f64).ln().floor() as usize
}

/// Returns whether `initial_step_size` is a valid step size
pub(crate) fn is_initial_step_size_valid(initial_step_size: f64) -> bool {
    initial_step_size.is_finite() && initial_step_size > 0.0
}

/// A builder for [`Optimizer`]. Used to adjust parameters of the algorithm to
/// each particular problem.
///
/// # Examples
///
/// ```
/// use nalgebra::DVector;
/// use popbox::OptimizerOptions;
///
/// let function = |x: &DVector<f64>| x.magnitude();
/// let dim = 3;
/// let optimizer = OptimizerOptions::new(dim)
///     .initial_mean(vec![2.0; dim])
///     .initial_step_size(5.0)
///     .max_evaluations(20_000)
///     .seed(96)
///     .build(function)
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct OptimizerOptions {
    /// Number of dimensions to search.
    pub dimensions: usize,
    /// Initial mean of the search distribution. This should be set to a
    /// first guess at the solution. Default value is the origin.
    pub initial_mean: DVector<f64>,
    /// Initial step size of the search distribution. This should be set to a
    /// first guess at how far the solution is from the initial mean. Default
    /// value is `0.5`.
    pub initial_step_size: f64,
    /// Number of points to generate each generation. Default value is
    /// `4 + 3 * floor(ln(dimensions))`.
    ///
    /// A larger population size will increase the robustness of the
    /// algorithm and help avoid local optima, but will lead to a slower
    /// convergence rate. Generally, the population size should only be
    /// increased from the default value, possibly through restarts.
    pub population_size: usize,
    /// Whether to minimize or maximize the objective function. Default value
    /// is `Mode::Minimize`.
    pub mode: Mode,
    /// The distribution update strategy to use. Default value is
    /// `Strategy::Cma`.
    pub strategy: Strategy,
    /// The distribution to use when assigning weights to individuals.
    /// Default value is `Weights::Negative`.
    pub weights: Weights,
    /// The learning rate for the mean update. Can be reduced for noisy
    /// functions. Default value is `1.0`.
    pub cm: f64,
    /// The maximum number of objective function evaluations allowed before
    /// the run stops with `BudgetExhausted`. Default value is no limit.
    pub max_evaluations: Option<usize>,
    /// The maximum number of generations allowed before the run stops with
    /// `MaxGenerations`. Default value is no limit.
    pub max_generations: Option<usize>,
    /// The function value at which the run stops early with
    /// `FitnessTarget`. Default value is none.
    pub fitness_target: Option<f64>,
    /// The value for the `TolFun` stop reason (see
    /// [`StopReason`][crate::StopReason]). Default value is `1e-12`.
    pub tol_fun: f64,
    /// The number of recent generations examined by the `TolFun` check.
    /// Default value is `10 + ceil(30 * dimensions / population_size)`, used
    /// if this field is `None`.
    pub tol_fun_window: Option<usize>,
    /// The value for the `TolX` stop reason (see
    /// [`StopReason`][crate::StopReason]). Default value is
    /// `1e-12 * initial_step_size`, used if this field is `None`.
    pub tol_x: Option<f64>,
    /// The number of generations without improvement of the overall best
    /// function value before the run stops with `Stagnation`. Default value
    /// is `100 + ceil(100 * dimensions^1.5 / population_size)`, used if this
    /// field is `None`.
    pub stagnation_window: Option<usize>,
    /// The covariance matrix condition number above which the run stops with
    /// `IllConditioned`. Default value is `1e14`.
    pub tol_condition_cov: f64,
    /// The seed for the random number generator. Two runs with the same seed
    /// and options produce identical results. Default value is a random seed
    /// from entropy.
    pub seed: Option<u64>,
    /// The number of worker threads used by the parallel run methods.
    /// Default value is `None`, which uses the global thread pool.
    pub parallel_workers: Option<usize>,
    /// The search space bounds, used to validate the initial mean and to
    /// draw fresh means when restarting. Default value is none.
    pub search_bounds: Option<RangeInclusive<f64>>,
    /// What to do when an objective function evaluation fails. Default value
    /// is `FailurePolicy::FailFast`.
    pub failure_policy: FailurePolicy,
    /// What to do when the objective function returns a non-finite value.
    /// Default value is `InvalidFitnessPolicy::Reject`.
    pub invalid_fitness_policy: InvalidFitnessPolicy,
    /// The minimum number of evaluations between printed progress lines, or
    /// `None` to disable printing. Default value is `None`.
    pub print_gap_evals: Option<usize>,
}

impl OptimizerOptions {
    /// Creates a new `OptimizerOptions` with default values. Set individual
    /// options using the provided methods.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            initial_mean: DVector::zeros(dimensions),
            initial_step_size: DEFAULT_INITIAL_STEP_SIZE,
            population_size: default_population_size(dimensions),
            mode: Mode::default(),
            strategy: Strategy::default(),
            weights: Weights::default(),
            cm: 1.0,
            max_evaluations: None,
            max_generations: None,
            fitness_target: None,
            tol_fun: 1e-12,
            tol_fun_window: None,
            tol_x: None,
            stagnation_window: None,
            tol_condition_cov: 1e14,
            seed: None,
            parallel_workers: None,
            search_bounds: None,
            failure_policy: FailurePolicy::default(),
            invalid_fitness_policy: InvalidFitnessPolicy::default(),
            print_gap_evals: None,
        }
    }

    /// Changes the initial mean from the origin.
    pub fn initial_mean<V: Into<DVector<f64>>>(mut self, initial_mean: V) -> Self {
        self.initial_mean = initial_mean.into();
        self
    }

    /// Changes the initial step size from the default value.
    pub fn initial_step_size(mut self, initial_step_size: f64) -> Self {
        self.initial_step_size = initial_step_size;
        self
    }

    /// Changes the population size from the default value (must be at least
    /// 4).
    pub fn population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    /// Changes the optimization mode from the default of `Mode::Minimize`.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Changes the update strategy from the default of `Strategy::Cma`. See
    /// [`Strategy`] for the possible strategies.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Changes the weight distribution from the default of
    /// `Weights::Negative`. See [`Weights`] for possible distributions.
    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// Changes the learning rate for the mean update from the default value
    /// (must be in `(0, 1]`).
    pub fn cm(mut self, cm: f64) -> Self {
        self.cm = cm;
        self
    }

    /// Sets the maximum number of objective function evaluations.
    pub fn max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    /// Sets the maximum number of generations.
    pub fn max_generations(mut self, max_generations: usize) -> Self {
        self.max_generations = Some(max_generations);
        self
    }

    /// Sets the function value at which the run stops early.
    pub fn fitness_target(mut self, fitness_target: f64) -> Self {
        self.fitness_target = Some(fitness_target);
        self
    }

    /// Changes the value for the `TolFun` stop reason from the default value.
    pub fn tol_fun(mut self, tol_fun: f64) -> Self {
        self.tol_fun = tol_fun;
        self
    }

    /// Changes the number of generations examined by the `TolFun` check from
    /// the default value.
    pub fn tol_fun_window(mut self, tol_fun_window: usize) -> Self {
        self.tol_fun_window = Some(tol_fun_window);
        self
    }

    /// Changes the value for the `TolX` stop reason from the default value.
    pub fn tol_x(mut self, tol_x: f64) -> Self {
        self.tol_x = Some(tol_x);
        self
    }

    /// Changes the number of generations without improvement tolerated
    /// before the run stops with `Stagnation` from the default value.
    pub fn stagnation_window(mut self, stagnation_window: usize) -> Self {
        self.stagnation_window = Some(stagnation_window);
        self
    }

    /// Changes the covariance matrix condition number limit from the default
    /// value.
    pub fn tol_condition_cov(mut self, tol_condition_cov: f64) -> Self {
        self.tol_condition_cov = tol_condition_cov;
        self
    }

    /// Sets the seed for the random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the number of worker threads used by the parallel run methods.
    pub fn parallel_workers(mut self, parallel_workers: usize) -> Self {
        self.parallel_workers = Some(parallel_workers);
        self
    }

    /// Sets the search space bounds, applied to every coordinate.
    pub fn search_bounds(mut self, search_bounds: RangeInclusive<f64>) -> Self {
        self.search_bounds = Some(search_bounds);
        self
    }

    /// Changes what happens when an objective function evaluation fails from
    /// the default of `FailurePolicy::FailFast`.
    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Changes what happens when the objective function returns a non-finite
    /// value from the default of `InvalidFitnessPolicy::Reject`.
    pub fn invalid_fitness_policy(
        mut self,
        invalid_fitness_policy: InvalidFitnessPolicy,
    ) -> Self {
        self.invalid_fitness_policy = invalid_fitness_policy;
        self
    }

    /// Enables printing a summary of the run progress, with at least
    /// `min_gap_evals` objective function evaluations between printed lines.
    /// [`DEFAULT_PRINT_GAP_EVALS`] is a reasonable value for `min_gap_evals`.
    pub fn enable_printing(mut self, min_gap_evals: usize) -> Self {
        self.print_gap_evals = Some(min_gap_evals);
        self
    }

    /// Checks every option against its documented constraints.
    pub(crate) fn validate(&self) -> Result<(), InvalidOptionsError> {
        if self.dimensions == 0 {
            return Err(InvalidOptionsError::ZeroDimensions);
        }

        if self.initial_mean.len() != self.dimensions {
            return Err(InvalidOptionsError::MeanDimensionMismatch {
                expected: self.dimensions,
                actual: self.initial_mean.len(),
            });
        }

        if self.population_size < MIN_POPULATION_SIZE {
            return Err(InvalidOptionsError::SmallPopulationSize);
        }

        if !is_initial_step_size_valid(self.initial_step_size) {
            return Err(InvalidOptionsError::InvalidStepSize);
        }

        if !(self.cm > 0.0 && self.cm <= 1.0) {
            return Err(InvalidOptionsError::InvalidLearningRate);
        }

        if let Some(bounds) = &self.search_bounds {
            if !(bounds.start().is_finite() && bounds.end().is_finite()) || bounds.is_empty() {
                return Err(InvalidOptionsError::InvalidSearchBounds);
            }

            if !self.initial_mean.iter().all(|x| bounds.contains(x)) {
                return Err(InvalidOptionsError::MeanOutsideSearchBounds);
            }
        }

        Ok(())
    }

    /// Attempts to build the [`Optimizer`] using the chosen options.
    pub fn build<F>(self, objective_function: F) -> Result<Optimizer<F>, InvalidOptionsError> {
        Optimizer::new(objective_function, self)
    }

    /// Attempts to build an [`Optimizer`] that continues the run recorded in
    /// `checkpoint`, using the chosen options.
    ///
    /// The options must describe the same problem shape as the checkpoint
    /// (dimensions, population size, strategy, and mode), but resource
    /// limits such as `max_evaluations` may differ to extend the run.
    pub fn resume<F>(
        self,
        objective_function: F,
        checkpoint: Checkpoint,
    ) -> Result<Optimizer<F>, ResumeError> {
        Optimizer::from_checkpoint(objective_function, self, checkpoint)
    }
}

/// Represents invalid options for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidOptionsError {
    /// The number of dimensions is set to zero.
    ZeroDimensions,
    /// The dimension of the initial mean does not match the chosen
    /// dimension.
    MeanDimensionMismatch { expected: usize, actual: usize },
    /// The population size is too small (must be at least 4).
    SmallPopulationSize,
    /// The initial step size is not positive and finite.
    InvalidStepSize,
    /// The learning rate for the mean lies outside `(0, 1]`.
    InvalidLearningRate,
    /// The search bounds are empty or not finite.
    InvalidSearchBounds,
    /// The initial mean lies outside the search bounds.
    MeanOutsideSearchBounds,
    /// The evaluation thread pool could not be created.
    ThreadPool(String),
}

impl fmt::Display for InvalidOptionsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvalidOptionsError::ZeroDimensions => {
                write!(f, "the number of dimensions must be at least 1")
            }
            InvalidOptionsError::MeanDimensionMismatch { expected, actual } => write!(
                f,
                "the initial mean has {} dimensions but the problem has {}",
                actual, expected
            ),
            InvalidOptionsError::SmallPopulationSize => {
                write!(f, "the population size must be at least {}", MIN_POPULATION_SIZE)
            }
            InvalidOptionsError::InvalidStepSize => {
                write!(f, "the initial step size must be positive and finite")
            }
            InvalidOptionsError::InvalidLearningRate => {
                write!(f, "the learning rate for the mean must lie in (0, 1]")
            }
            InvalidOptionsError::InvalidSearchBounds => {
                write!(f, "the search bounds must be a non-empty finite range")
            }
            InvalidOptionsError::MeanOutsideSearchBounds => {
                write!(f, "the initial mean must lie within the search bounds")
            }
            InvalidOptionsError::ThreadPool(message) => {
                write!(f, "the evaluation thread pool could not be created: {}", message)
            }
        }
    }
}

impl Error for InvalidOptionsError {}
