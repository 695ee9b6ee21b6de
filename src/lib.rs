//! A library for population-based black-box optimization of arbitrary
//! objective functions. It searches for the minimum (or maximum) value of a
//! function without using gradients and performs well on non-linear,
//! non-convex, ill-conditioned, and/or noisy problems.
//!
//! # Quick Start
//!
//! To optimize a function, simply create and build an [`OptimizerOptions`]
//! and call [`Optimizer::run`]. Customization of algorithm parameters should
//! be done on a per-problem basis using [`OptimizerOptions`].
//!
//! ```
//! use popbox::{DVector, OptimizerOptions};
//!
//! let sphere = |x: &DVector<f64>| x.iter().map(|xi| xi.powi(2)).sum();
//!
//! let dim = 10;
//! let mut optimizer = OptimizerOptions::new(dim)
//!     .initial_mean(vec![1.0; dim])
//!     .fitness_target(1e-10)
//!     .max_evaluations(100_000)
//!     .build(sphere)
//!     .unwrap();
//!
//! let report = optimizer.run();
//! ```
//!
//! The [`objective_function`] module provides traits that allow for custom
//! objective function types that store state and parameters, as well as
//! wrappers that add explicit failure reporting, per-call timeouts, and
//! coordinate scaling at the objective boundary. The [`Optimizer::next`]
//! method provides finer control over iteration if needed.
//!
//! Each generation can be evaluated on multiple threads with
//! [`Optimizer::run_parallel`], long runs can be saved and resumed later with
//! [`Optimizer::checkpoint`], and the [`restart`] module wraps the whole
//! algorithm in automatic restart policies. For quick experiments, [`fmin`]
//! and its siblings run with sensible defaults in a single call.
//!
//! See [this paper][0] for details on the default covariance matrix
//! adaptation strategy. This library is based on the linked paper and the
//! [pycma][1] implementation. The alternative step size adaptation strategies
//! are described in [this overview][2].
//!
//! [0]: https://arxiv.org/pdf/1604.00772.pdf
//! [1]: https://github.com/CMA-ES/pycma
//! [2]: https://hal.inria.fr/hal-01297559v2/document

// lib.rs contains the top-level `Optimizer` type that drives the algorithm as
// well as the user-facing types for termination data.
//
// Configuration is handled in the `options` module.
//
// Initialization happens in `Optimizer::new`, but initialization of
// individual components can be found in their respective modules.
//
// Iteration happens in `Optimizer::next`, but the interesting parts are
// handled in the `sampling`, `evaluation`, and `state` modules.
//
// Termination criteria are handled in the `termination` module, and saving
// and resuming runs in the `checkpoint` module.

mod checkpoint;
mod evaluation;
mod functions;
mod history;
mod matrix;
mod mode;
pub mod objective_function;
pub mod options;
pub mod parameters;
pub mod restart;
mod sampling;
mod state;
pub mod strategy;
pub mod termination;
mod utils;

pub use nalgebra::DVector;

pub use crate::checkpoint::{Checkpoint, CheckpointError, ResumeError};
pub use crate::evaluation::{FailurePolicy, InvalidFitnessPolicy};
pub use crate::functions::{fmax, fmax_parallel, fmin, fmin_parallel};
pub use crate::mode::Mode;
pub use crate::objective_function::{
    Fallible, ObjectiveError, ObjectiveFunction, ParallelObjectiveFunction, Scale, Timeout,
};
pub use crate::options::{OptimizerOptions, DEFAULT_PRINT_GAP_EVALS};
pub use crate::parameters::Weights;
pub use crate::strategy::Strategy;
pub use crate::termination::{RunStatus, StopReason};

use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::evaluation::{
    EvaluatedPoint, EvaluationBudget, EvaluationError, Evaluator, GenerationError,
};
use crate::history::History;
use crate::matrix::SquareMatrix;
use crate::options::InvalidOptionsError;
use crate::parameters::Parameters;
use crate::sampling::Sampler;
use crate::state::{SearchState, UpdateError};

/// An individual point with its corresponding objective function value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub point: DVector<f64>,
    pub value: f64,
}

impl Individual {
    pub(crate) fn new(point: DVector<f64>, value: f64) -> Self {
        Self { point, value }
    }
}

/// A handle used to request cancellation of a run, usually from another
/// thread.
///
/// Obtained from [`Optimizer::cancel_handle`]. Cancellation is cooperative:
/// it is observed between generations, never in the middle of one, and makes
/// the run return a report with [`StopReason::Cancelled`].
#[derive(Clone, Debug)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests that the run stop before starting its next generation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Data returned when a run terminates.
///
/// Contains the:
///
/// - Best individual of the latest generation
/// - Best individual overall
/// - Final mean, which may be better than either individual
/// - Reason for termination, which can be used to decide how to interpret the
/// result and whether and how to restart the algorithm
/// - Diagnostic message describing the error behind a failed run
/// - Total evaluation and generation counts
///
/// The best individuals are `None` only if the run stopped before any
/// candidate could be evaluated.
#[derive(Clone, Debug)]
pub struct TerminationReport {
    pub current_best: Option<Individual>,
    pub overall_best: Option<Individual>,
    pub final_mean: DVector<f64>,
    pub reason: StopReason,
    pub diagnostic: Option<String>,
    pub evaluations: usize,
    pub generations: usize,
}

impl TerminationReport {
    /// Returns the terminal state of the run, derived from the stop reason.
    pub fn status(&self) -> RunStatus {
        self.reason.status()
    }
}

/// A type that handles algorithm iteration and printing of results. Use
/// [`OptimizerOptions`] to create an `Optimizer`.
///
/// # Examples
///
/// ```
/// use popbox::{DVector, OptimizerOptions};
///
/// let function = |x: &DVector<f64>| x.magnitude();
/// let mut optimizer = OptimizerOptions::new(4)
///     .fitness_target(1e-8)
///     .build(function)
///     .unwrap();
///
/// let report = optimizer.run();
/// let best = report.overall_best.unwrap();
/// ```
///
/// In the case of a closure that references variables from its scope, the
/// `move` keyword can be used to avoid borrowing issues:
///
/// ```
/// use popbox::{DVector, OptimizerOptions};
///
/// let mut calls = 0.0;
/// let function = move |_: &DVector<f64>| {
///     calls += 1.0;
///     calls
/// };
/// let optimizer = OptimizerOptions::new(2).build(function).unwrap();
/// ```
#[derive(Debug)]
pub struct Optimizer<F> {
    /// Point sampler
    sampler: Sampler,
    /// Objective function evaluator, budget tracking, and failure policies
    evaluator: Evaluator<F>,
    /// Constant parameters
    parameters: Parameters,
    /// Variable state of the search distribution
    state: SearchState,
    /// Best individuals and the per-generation best value history
    history: History,
    /// Cancellation flag shared with every [`CancelHandle`] given out
    cancel: CancelHandle,
    /// The minimum number of function evaluations to wait for in between each
    /// automatic [`Optimizer::print_info`] call
    print_gap_evals: Option<usize>,
    /// The last time [`Optimizer::print_info`] was called, in function
    /// evaluations
    last_print_evals: usize,
}

impl<F> Optimizer<F> {
    /// Initializes an `Optimizer` from a set of [`OptimizerOptions`].
    /// [`OptimizerOptions::build`] should generally be used instead.
    pub fn new(objective_function: F, options: OptimizerOptions) -> Result<Self, InvalidOptionsError> {
        options.validate()?;

        let seed = options.seed.unwrap_or_else(rand::random);

        let thread_pool = options
            .parallel_workers
            .map(|workers| {
                ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|error| InvalidOptionsError::ThreadPool(error.to_string()))
            })
            .transpose()?;

        let parameters = Parameters::from_options(&options, seed);
        let evaluator = Evaluator::new(
            objective_function,
            EvaluationBudget::new(options.max_evaluations),
            options.mode,
            options.failure_policy,
            options.invalid_fitness_policy,
            thread_pool,
        );

        let optimizer = Self {
            sampler: Sampler::new(options.dimensions, seed),
            evaluator,
            parameters,
            state: SearchState::new(options.initial_mean, options.initial_step_size),
            history: History::new(options.mode),
            cancel: CancelHandle::new(),
            print_gap_evals: options.print_gap_evals,
            last_print_evals: 0,
        };

        // Print initial info
        if optimizer.print_gap_evals.is_some() {
            optimizer.print_initial_info();
        }

        Ok(optimizer)
    }

    /// Initializes an `Optimizer` that continues the run recorded in
    /// `checkpoint`. [`OptimizerOptions::resume`] should generally be used
    /// instead.
    ///
    /// The counters, search distribution, value history, and random number
    /// generator are all restored, so the continuation follows the same
    /// trajectory as an uninterrupted run. The evaluation budget maximum is
    /// taken from `options`, which allows extending the budget of a finished
    /// run.
    pub fn from_checkpoint(
        objective_function: F,
        options: OptimizerOptions,
        checkpoint: Checkpoint,
    ) -> Result<Self, ResumeError> {
        options.validate()?;
        checkpoint.validate_shape(&options)?;

        let thread_pool = options
            .parallel_workers
            .map(|workers| {
                ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|error| InvalidOptionsError::ThreadPool(error.to_string()))
            })
            .transpose()?;

        let parameters = Parameters::from_options(&options, checkpoint.seed);
        let evaluator = Evaluator::new(
            objective_function,
            EvaluationBudget::restore(checkpoint.function_evals, options.max_evaluations),
            options.mode,
            options.failure_policy,
            options.invalid_fitness_policy,
            thread_pool,
        );

        let optimizer = Self {
            sampler: Sampler::from_rng(options.dimensions, checkpoint.rng),
            evaluator,
            parameters,
            state: checkpoint.state,
            history: checkpoint.history,
            cancel: CancelHandle::new(),
            print_gap_evals: options.print_gap_evals,
            // Respect the print gap from the resume point onwards
            last_print_evals: checkpoint.function_evals,
        };

        if optimizer.print_gap_evals.is_some() {
            optimizer.print_initial_info();
        }

        Ok(optimizer)
    }

    /// Advances to the next generation, using `evaluate` to produce the
    /// ranked individuals of the generation.
    fn next_inner<E>(&mut self, evaluate: E) -> Option<TerminationReport>
    where
        E: FnOnce(
            &mut Evaluator<F>,
            &mut Sampler,
            &SearchState,
            &Parameters,
            usize,
        ) -> Result<Vec<EvaluatedPoint>, GenerationError>,
    {
        // Cancellation is only observed here, between generations
        if self.cancel.is_cancelled() {
            return Some(self.report(StopReason::Cancelled, None));
        }

        let lambda = self.parameters.lambda();

        // The final generation of a budgeted run may be smaller than lambda
        let count = match self.evaluator.budget().remaining() {
            Some(remaining) => lambda.min(remaining),
            None => lambda,
        };

        if count == 0 {
            return Some(self.report(StopReason::BudgetExhausted, None));
        }

        let individuals = match evaluate(
            &mut self.evaluator,
            &mut self.sampler,
            &self.state,
            &self.parameters,
            count,
        ) {
            Ok(individuals) => individuals,
            Err(error) => {
                let reason = match &error {
                    GenerationError::DegenerateDistribution(_) => {
                        StopReason::DegenerateDistribution
                    }
                    GenerationError::Evaluation(EvaluationError::BudgetExceeded) => {
                        StopReason::BudgetExhausted
                    }
                    GenerationError::Evaluation(EvaluationError::ObjectiveFailure(_)) => {
                        StopReason::ObjectiveFailure
                    }
                    GenerationError::Evaluation(EvaluationError::InvalidFitness(_)) => {
                        StopReason::InvalidFitness
                    }
                };
                return Some(self.report(reason, Some(error.to_string())));
            }
        };

        if individuals.is_empty() {
            // The budget ran out before any point of this generation could be
            // evaluated
            return Some(self.report(StopReason::BudgetExhausted, None));
        }

        self.history.update(&individuals);

        // A partial generation cannot feed a full rank-based update, so the
        // distribution is left unchanged and only the best values above are
        // recorded
        if individuals.len() == lambda {
            if let Err(error) = self.state.update(
                self.evaluator.budget().consumed(),
                &self.parameters,
                &individuals,
            ) {
                let reason = match error {
                    UpdateError::DegenerateCovariance => StopReason::DegenerateDistribution,
                    UpdateError::NumericalInstability => StopReason::NumericalInstability,
                };
                return Some(self.report(reason, Some(error.to_string())));
            }
        }

        // Print latest state
        if let Some(gap_evals) = self.print_gap_evals {
            if self.evaluator.budget().consumed() >= self.last_print_evals + gap_evals {
                self.print_info();
                self.last_print_evals = self.evaluator.budget().consumed();
            } else if self.state.generation() < 4 {
                // The first few generations are always printed;
                // last_print_evals is left unchanged so the gap still counts
                // from the start of the run
                self.print_info();
            }
        }

        // Terminate if any stopping condition is met; the reasons are ordered
        // from most to least meaningful so the first one is reported
        let reasons = termination::check_termination(
            self.evaluator.budget(),
            &self.parameters,
            &self.state,
            &self.history,
            &individuals,
        );

        reasons.first().map(|&reason| self.report(reason, None))
    }

    /// Returns a `TerminationReport` for the current state of the run.
    fn report(&self, reason: StopReason, diagnostic: Option<String>) -> TerminationReport {
        TerminationReport {
            current_best: self.history.current_best_individual().cloned(),
            overall_best: self.history.overall_best_individual().cloned(),
            final_mean: self.state.mean().clone(),
            reason,
            diagnostic,
            evaluations: self.evaluator.budget().consumed(),
            generations: self.state.generation(),
        }
    }

    /// Returns a snapshot of the run that can be serialized with
    /// [`Checkpoint::write_to`] and resumed later with
    /// [`OptimizerOptions::resume`].
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            dimensions: self.parameters.dim(),
            population_size: self.parameters.lambda(),
            strategy: self.parameters.strategy(),
            mode: self.parameters.mode(),
            seed: self.parameters.seed(),
            state: self.state.clone(),
            history: self.history.clone(),
            function_evals: self.evaluator.budget().consumed(),
            rng: self.sampler.rng().clone(),
        }
    }

    /// Returns a handle that can be moved to another thread to cancel this
    /// run cooperatively.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Consumes `self` and returns the objective function.
    pub fn into_objective_function(self) -> F {
        self.evaluator.into_objective_function()
    }

    /// Returns the objective function.
    pub fn objective_function(&self) -> &F {
        self.evaluator.objective_function()
    }

    /// Returns the constant parameters of the algorithm.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the number of generations that have been fully completed.
    pub fn generation(&self) -> usize {
        self.state.generation()
    }

    /// Returns the number of times the objective function has been evaluated.
    pub fn function_evals(&self) -> usize {
        self.evaluator.budget().consumed()
    }

    /// Returns the current mean of the distribution.
    pub fn mean(&self) -> &DVector<f64> {
        self.state.mean()
    }

    /// Returns the current covariance matrix of the distribution.
    pub fn covariance_matrix(&self) -> &SquareMatrix<f64> {
        self.state.covariance().cov()
    }

    /// Returns the current eigenvalues of the distribution.
    pub fn eigenvalues(&self) -> DVector<f64> {
        self.state
            .covariance()
            .sqrt_eigenvalues()
            .diagonal()
            .map(|x| x.powi(2))
    }

    /// Returns the current step size of the distribution.
    pub fn sigma(&self) -> f64 {
        self.state.sigma()
    }

    /// Returns the current axis ratio of the distribution.
    pub fn axis_ratio(&self) -> f64 {
        self.state.axis_ratio()
    }

    /// Returns the best individual of the latest generation and its function
    /// value. Will always return `Some` as long as at least one generation
    /// has been evaluated.
    pub fn current_best_individual(&self) -> Option<&Individual> {
        self.history.current_best_individual()
    }

    /// Returns the best individual of any generation and its function value.
    /// Will always return `Some` as long as at least one generation has been
    /// evaluated.
    pub fn overall_best_individual(&self) -> Option<&Individual> {
        self.history.overall_best_individual()
    }

    /// Prints various initial parameters of the algorithm as well as the
    /// headers for the columns printed by
    /// [`print_info`][Self::print_info]. The parameters that are printed are
    /// the:
    ///
    /// - Algorithm variant (based on the [`Strategy`] and [`Weights`]
    /// settings)
    /// - Dimension (N)
    /// - Population size (lambda)
    /// - Seed
    ///
    /// This function is called automatically if
    /// [`OptimizerOptions::enable_printing`] is set.
    pub fn print_initial_info(&self) {
        let params = &self.parameters;
        let variant = match (params.strategy(), params.weights_setting()) {
            (Strategy::Cma, Weights::Negative) => "active CMA",
            (Strategy::Cma, _) => "CMA",
            (Strategy::SelfAdaptiveSigma, _) => "self-adaptive step size",
            (Strategy::SuccessRule, _) => "success rule",
        };
        println!(
            "{} optimization with dimension={}, population_size={}, seed={}",
            variant,
            params.dim(),
            params.lambda(),
            params.seed()
        );

        let title_string = format!(
            "{:^7} | {:^7} | {:^19} | {:^10} | {:^10} | {:^10} | {:^10}",
            "Gen #", "f evals", "Best function value", "Axis Ratio", "Sigma", "Min std", "Max std",
        );

        println!("{}", title_string);
        println!("{}", "-".repeat(title_string.chars().count()));
    }

    /// Prints various state variables of the algorithm. The variables that
    /// are printed are the:
    ///
    /// - Generations completed
    /// - Function evaluations made
    /// - Best function value of the latest generation
    /// - Distribution axis ratio
    /// - Overall standard deviation (sigma)
    /// - Minimum and maximum standard deviations in the coordinate axes
    ///
    /// This function is called automatically if
    /// [`OptimizerOptions::enable_printing`] is set.
    pub fn print_info(&self) {
        let generations = format!("{:7}", self.state.generation());
        let evals = format!("{:7}", self.evaluator.budget().consumed());
        let best_function_value = self
            .history
            .current_best_individual()
            .map(|x| utils::format_num(x.value, 19))
            .unwrap_or(format!("{:19}", ""));
        let axis_ratio = utils::format_num(self.state.axis_ratio(), 11);
        let sigma = utils::format_num(self.state.sigma(), 11);
        let cov_diag = self.state.covariance().cov().diagonal();
        let min_std = utils::format_num(self.state.sigma() * cov_diag.min().sqrt(), 11);
        let max_std = utils::format_num(self.state.sigma() * cov_diag.max().sqrt(), 11);

        // The preceding space for values that can't have a negative sign is
        // removed (an extra digit takes its place)
        println!(
            "{} | {} | {} |{} |{} |{} |{}",
            generations, evals, best_function_value, axis_ratio, sigma, min_std, max_std
        );
    }

    /// Calls [`print_info`][Self::print_info] if not already called
    /// automatically this generation and prints the results. The values that
    /// are printed are the:
    ///
    /// - Terminal status and stop reason
    /// - Diagnostic message, for failed runs
    /// - Best function value of the latest generation
    /// - Best function value of any generation
    /// - Final distribution mean
    ///
    /// This function is called automatically if
    /// [`OptimizerOptions::enable_printing`] is set. Must be called manually
    /// after termination to print the final state if [`run`][Self::run] isn't
    /// used.
    pub fn print_final_info(&self, report: &TerminationReport) {
        if self.evaluator.budget().consumed() != self.last_print_evals {
            self.print_info();
        }

        println!(
            "Terminated with status `{}` (stop reason `{}`)",
            report.status(),
            report.reason
        );

        if let Some(diagnostic) = &report.diagnostic {
            println!("Diagnostic: {}", diagnostic);
        }

        if let (Some(current), Some(overall)) = (&report.current_best, &report.overall_best) {
            println!("Current best function value: {:e}", current.value);
            println!("Overall best function value: {:e}", overall.value);
        }

        println!("Final mean: {}", self.state.mean());
    }
}

impl<F: ObjectiveFunction> Optimizer<F> {
    /// Iterates the algorithm until termination. [`next`][Self::next] can be
    /// called manually if more control over termination is needed (printing
    /// the final state must be done manually as well in this case).
    pub fn run(&mut self) -> TerminationReport {
        let report = loop {
            if let Some(report) = self.next() {
                break report;
            }
        };

        // Print the final state
        if self.print_gap_evals.is_some() {
            self.print_final_info(&report);
        }

        report
    }

    /// Advances to the next generation. Returns `Some` if the run has
    /// terminated and the algorithm should be stopped. [`run`][Self::run] is
    /// generally easier to use, but iteration can be performed manually if
    /// finer control is needed (printing the final state must be done
    /// manually as well in this case).
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn next(&mut self) -> Option<TerminationReport> {
        self.next_inner(|evaluator, sampler, state, parameters, count| {
            evaluator.evaluate_generation(sampler, state, parameters, count)
        })
    }
}

impl<F: ParallelObjectiveFunction> Optimizer<F> {
    /// Like [`run`][Self::run], but evaluates each generation's points in
    /// parallel. Requires the objective function to implement
    /// [`ParallelObjectiveFunction`].
    ///
    /// The number of threads used can be limited with
    /// [`OptimizerOptions::parallel_workers`][crate::OptimizerOptions].
    pub fn run_parallel(&mut self) -> TerminationReport {
        let report = loop {
            if let Some(report) = self.next_parallel() {
                break report;
            }
        };

        if self.print_gap_evals.is_some() {
            self.print_final_info(&report);
        }

        report
    }

    /// Like [`next`][Self::next], but evaluates each generation's points in
    /// parallel.
    #[must_use]
    pub fn next_parallel(&mut self) -> Option<TerminationReport> {
        self.next_inner(|evaluator, sampler, state, parameters, count| {
            evaluator.evaluate_generation_parallel(sampler, state, parameters, count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::objective_function::Fallible;

    fn sphere(x: &DVector<f64>) -> f64 {
        x.iter().map(|xi| xi.powi(2)).sum()
    }

    fn dummy_function(_: &DVector<f64>) -> f64 {
        0.0
    }

    #[test]
    fn test_get_best_individuals() {
        let mut optimizer = OptimizerOptions::new(10).build(dummy_function).unwrap();

        assert!(optimizer.current_best_individual().is_none());
        assert!(optimizer.overall_best_individual().is_none());

        let _ = optimizer.next();

        assert!(optimizer.current_best_individual().is_some());
        assert!(optimizer.overall_best_individual().is_some());
    }

    #[test]
    fn test_fitness_target() {
        let mut optimizer = OptimizerOptions::new(2)
            .initial_mean(vec![3.0; 2])
            .fitness_target(1e-8)
            .seed(96)
            .build(sphere)
            .unwrap();

        let report = optimizer.run();

        assert_eq!(StopReason::FitnessTarget, report.reason);
        assert_eq!(RunStatus::Converged, report.status());
        assert!(report.overall_best.unwrap().value <= 1e-8);
        assert!(report.generations > 0);
        assert_eq!(report.evaluations, optimizer.function_evals());
    }

    #[test]
    fn test_max_generations() {
        let mut optimizer = OptimizerOptions::new(10)
            .max_generations(5)
            .seed(11)
            .build(dummy_function)
            .unwrap();

        let report = optimizer.run();

        assert_eq!(StopReason::MaxGenerations, report.reason);
        assert_eq!(RunStatus::BudgetExhausted, report.status());
        assert_eq!(5, report.generations);
    }

    #[test]
    fn test_budget_exhausted_exactly() {
        // With a population of 6, 8 evaluations span one full generation and
        // one partial one
        let mut optimizer = OptimizerOptions::new(2)
            .population_size(6)
            .max_evaluations(8)
            .seed(11)
            .build(sphere)
            .unwrap();

        let report = optimizer.run();

        assert_eq!(StopReason::BudgetExhausted, report.reason);
        assert_eq!(RunStatus::BudgetExhausted, report.status());
        assert_eq!(8, report.evaluations);
        assert_eq!(8, optimizer.function_evals());
        // The partial final generation does not update the distribution
        assert_eq!(1, report.generations);
        assert!(report.overall_best.is_some());
    }

    #[test]
    fn test_budget_of_zero() {
        let report = OptimizerOptions::new(2)
            .max_evaluations(0)
            .build(sphere)
            .unwrap()
            .run();

        assert_eq!(StopReason::BudgetExhausted, report.reason);
        assert!(report.current_best.is_none());
        assert!(report.overall_best.is_none());
        assert_eq!(0, report.evaluations);
        assert_eq!(0, report.generations);
    }

    #[test]
    fn test_cancellation() {
        let mut optimizer = OptimizerOptions::new(4).seed(5).build(sphere).unwrap();
        let handle = optimizer.cancel_handle();

        assert!(optimizer.next().is_none());
        assert!(optimizer.next().is_none());

        handle.cancel();
        assert!(handle.is_cancelled());

        let report = optimizer.run();

        assert_eq!(StopReason::Cancelled, report.reason);
        assert_eq!(RunStatus::Cancelled, report.status());
        // Cancellation is observed before the next generation starts, so no
        // further evaluations happen
        assert_eq!(2 * optimizer.parameters().lambda(), report.evaluations);
        assert!(report.overall_best.is_some());
    }

    #[test]
    fn test_objective_failure() {
        let mut optimizer = OptimizerOptions::new(4)
            .build(Fallible(|_: &DVector<f64>| -> Result<f64, ObjectiveError> {
                Err(ObjectiveError::new("broken sensor"))
            }))
            .unwrap();

        let report = optimizer.run();

        assert_eq!(StopReason::ObjectiveFailure, report.reason);
        assert_eq!(RunStatus::Failed, report.status());
        assert!(report.diagnostic.unwrap().contains("broken sensor"));
        assert!(report.current_best.is_none());
        assert_eq!(1, report.evaluations);
        assert_eq!(0, report.generations);
    }

    #[test]
    fn test_checkpoint_captures_counters() {
        let mut optimizer = OptimizerOptions::new(2)
            .max_generations(3)
            .seed(7)
            .build(sphere)
            .unwrap();
        let _ = optimizer.run();

        let checkpoint = optimizer.checkpoint();

        assert_eq!(2, checkpoint.dimensions);
        assert_eq!(optimizer.parameters().lambda(), checkpoint.population_size);
        assert_eq!(7, checkpoint.seed);
        assert_eq!(3 * optimizer.parameters().lambda(), checkpoint.function_evals);
        assert_eq!(3, checkpoint.state.generation());
    }

    #[test]
    fn test_distribution_and_best_stay_valid_across_generations() {
        let mut optimizer = OptimizerOptions::new(4)
            .initial_mean(vec![3.0; 4])
            .seed(23)
            .build(sphere)
            .unwrap();

        let mut previous_best = f64::INFINITY;
        for _ in 0..60 {
            if optimizer.next().is_some() {
                break;
            }

            // The covariance matrix stays symmetric and positive-definite
            // (within rounding drift) after every distribution update
            let cov = optimizer.state.covariance().cov();
            assert_eq!(*cov, cov.transpose());

            let eigenvalues = nalgebra::linalg::SymmetricEigen::new(cov.clone()).eigenvalues;
            let max_eigenvalue = eigenvalues.max();
            assert!(max_eigenvalue > 0.0);
            assert!(eigenvalues.iter().all(|&e| e > -1e-12 * max_eigenvalue));

            // The overall best never worsens between generations
            let best = optimizer.overall_best_individual().unwrap().value;
            assert!(best <= previous_best);
            previous_best = best;
        }
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let build = || {
            OptimizerOptions::new(4)
                .initial_mean(vec![2.0; 4])
                .fitness_target(1e-6)
                .seed(42)
                .build(sphere)
                .unwrap()
        };

        let sequential = build().run();
        let parallel = build().run_parallel();

        let best = sequential.overall_best.unwrap();
        let parallel_best = parallel.overall_best.unwrap();
        assert_eq!(best.point, parallel_best.point);
        assert_eq!(best.value, parallel_best.value);
        assert_eq!(sequential.evaluations, parallel.evaluations);
        assert_eq!(sequential.reason, parallel.reason);
    }
}
