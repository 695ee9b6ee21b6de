//! Types for automatically restarting a search. Useful for solving multimodal problems and
//! improving the robustness of the algorithm in general.
//!
//! To use automatic restarts, a [`RestartOptions`] can be created and built. Then, a `run_*`
//! method on [`Restarter`] should be called to execute the runs.
//!
//! Top-level configuration of the restarts is done through [`RestartOptions`], while configuration
//! of specific restart algorithms is done through their respective types (see [`RestartStrategy`]).
//!
//! For examples and complete usage documentation, see [`RestartOptions`] and [`Restarter`].

mod ipop;
mod local;
pub mod options;
mod strategy;

pub use ipop::Ipop;
pub use local::Local;
pub use options::RestartOptions;
pub use strategy::RestartStrategy;

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use std::fmt::{self, Debug};
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use crate::parameters::Parameters;
use crate::{
    utils, Individual, Mode, ObjectiveFunction, Optimizer, OptimizerOptions,
    ParallelObjectiveFunction, RunStatus, StopReason, TerminationReport,
};
use options::{InvalidRestartOptionsError, InvalidRestartStrategyOptionsError};
use strategy::{RestartControl, Strategy};

/// Represents the reason for the termination of the restart strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestartStopReason {
    /// The maximum number of runs has been reached. The exact value is specific to each restart
    /// strategy.
    MaxRuns,
    /// The target objective function value has been reached.
    FitnessTarget,
    /// The total evaluation allowance has been used up.
    MaxEvaluations,
    /// The time limit has been reached.
    MaxTime,
    /// A run failed, due to an objective function error or a numerical problem.
    FailedRun,
}

impl fmt::Display for RestartStopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// The results from executing a restart strategy.
#[derive(Clone, Debug)]
pub struct RestartResults {
    /// The best individual found across all runs. Always `Some` unless no points were evaluated
    /// before termination, such as when the first run fails immediately or the [`Restarter`]
    /// terminates before performing any runs.
    pub best: Option<Individual>,
    /// The reason for the restart strategy terminating.
    pub reason: RestartStopReason,
    /// The stop reason of each run, in execution order.
    pub run_reasons: Vec<StopReason>,
    /// The total number of times the objective function has been evaluated across all runs.
    pub function_evals: usize,
    /// The number of runs performed.
    pub runs: usize,
}

impl RestartResults {
    /// Prints the results of the `Restarter` run.
    fn print_results(&self) {
        println!(
            "Terminated in {} f-evals across {} runs with reason: `{}`",
            self.function_evals, self.runs, self.reason
        );
        if let Some(ref best) = self.best {
            println!("Best function value: {:e}", best.value);
            println!("Best point: {}", best.point);
        }
    }
}

/// A type that handles automatic restarting of runs. Use [`RestartOptions`] to build a
/// `Restarter`.
///
/// # Examples
///
/// A good default choice for most problems is [`Ipop`]:
///
/// ```no_run
/// use popbox::restart::{RestartOptions, RestartStrategy};
/// use popbox::DVector;
///
/// let function = |x: &DVector<f64>| x.magnitude();
///
/// let strategy = RestartStrategy::Ipop(Default::default());
/// let dim = 10;
/// let restarter = RestartOptions::new(dim, -5.0..=5.0, strategy)
///     .fitness_target(1e-10)
///     .enable_printing(true)
///     .build()
///     .unwrap();
///
/// let results = restarter.run(|| function);
/// ```
///
/// [`run`][Self::run] is used here, but [`run_parallel`][Self::run_parallel] can be used instead
/// for expensive objective functions to improve performance.
/// [`run_with_reuse`][Self::run_with_reuse] and
/// [`run_parallel_with_reuse`][Self::run_parallel_with_reuse] are also useful to reuse the
/// objective function and avoid initializing it each run (which can be used to store state across
/// runs).
#[derive(Clone, Debug)]
pub struct Restarter {
    /// The strategy to use in performing the restarts
    strategy: RestartStrategy,
    /// The number of dimensions to search
    dimensions: usize,
    /// The optimization mode
    mode: Mode,
    /// The range in which to generate the initial mean for each run
    search_range: RangeInclusive<f64>,
    /// The target objective function value
    fitness_target: Option<f64>,
    /// The number of objective function evaluations allowed across all runs
    max_evaluations: Option<usize>,
    /// The time limit across all runs
    max_time: Option<Duration>,
    /// The number of objective function evaluations allowed for each run
    max_evaluations_per_run: Option<usize>,
    /// The number of generations allowed for each run
    max_generations_per_run: Option<usize>,
    /// Whether to print info about each run
    print_info: bool,
    /// Seed for the RNG
    seed: u64,
    /// Used to generate numbers specifically relevant to performing restarts in addition to
    /// generating seeds for the runs themselves
    rng: ChaCha12Rng,
    /// The best individual found so far
    overall_best: Option<Individual>,
}

impl Restarter {
    /// Returns a new `Restarter` using the provided options. [`RestartOptions::build`] should
    /// generally be used instead.
    pub fn new(options: RestartOptions) -> Result<Self, InvalidRestartOptionsError> {
        let seed = options.seed.unwrap_or_else(rand::random);
        let start = *options.search_range.start();
        let end = *options.search_range.end();

        if options.dimensions == 0 {
            Err(InvalidRestartOptionsError::Dimensions)
        } else if !(start.is_finite() && end.is_finite()) || start == end {
            Err(InvalidRestartOptionsError::SearchRange)
        } else {
            // Flipped bounds are swapped rather than rejected
            let search_range = if start < end { start..=end } else { end..=start };

            Ok(Self {
                strategy: options.strategy,
                dimensions: options.dimensions,
                mode: options.mode,
                search_range,
                fitness_target: options.fitness_target,
                max_evaluations: options.max_evaluations,
                max_time: options.max_time,
                max_evaluations_per_run: options.max_evaluations_per_run,
                max_generations_per_run: options.max_generations_per_run,
                print_info: options.enable_printing,
                seed,
                rng: ChaCha12Rng::seed_from_u64(seed),
                overall_best: None,
            })
        }
    }

    /// Returns the seed for the RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Executes the restart strategy. Uses the objective function returned by
    /// `get_objective_function`, which is called once for each run (`F` can be a reference but not
    /// a mutable one). [`run_with_reuse`][Self::run_with_reuse] can be used to reuse the same
    /// objective function for each run instead (allows a mutable reference).
    pub fn run<F, G>(self, get_objective_function: G) -> RestartResults
    where
        F: ObjectiveFunction,
        G: FnMut() -> F,
    {
        self.run_internal(get_objective_function, false, |optimizer| optimizer.run())
    }

    /// Like [`run`][Self::run], but reuses `objective_function` instead of initializing one for
    /// every run.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use popbox::restart::{RestartOptions, RestartStrategy};
    /// use popbox::DVector;
    ///
    /// let mut counter = 0;
    /// let function = |x: &DVector<f64>| {
    ///     counter += 1;
    ///     x.magnitude()
    /// };
    ///
    /// let strategy = RestartStrategy::Ipop(Default::default());
    /// let results = RestartOptions::new(10, -1.0..=1.0, strategy)
    ///     .build()
    ///     .unwrap()
    ///     // `function` is passed by-value here, but a mutable reference can be used as well
    ///     .run_with_reuse(function);
    ///
    /// // `counter` is updated by all runs because `function` is reused
    /// assert_eq!(results.function_evals, counter);
    /// ```
    pub fn run_with_reuse<F: ObjectiveFunction>(self, objective_function: F) -> RestartResults {
        let mut function = Some(objective_function);
        self.run_internal(|| function.take().unwrap(), true, |optimizer| optimizer.run())
    }

    /// Like [`run`][Self::run], but executes the objective function in parallel using multiple
    /// threads. Requires that `F` implements
    /// [`ParallelObjectiveFunction`][crate::objective_function::ParallelObjectiveFunction].
    /// [`run_parallel_with_reuse`][Self::run_parallel_with_reuse] can be used to reuse the same
    /// objective function instead of initializing one for each run.
    pub fn run_parallel<F, G>(self, get_objective_function: G) -> RestartResults
    where
        F: ParallelObjectiveFunction,
        G: FnMut() -> F,
    {
        self.run_internal(get_objective_function, false, |optimizer| {
            optimizer.run_parallel()
        })
    }

    /// Like [`run_parallel`][Self::run_parallel], but reuses `objective_function` instead of
    /// initializing one for every run. See [`run_with_reuse`][Self::run_with_reuse].
    pub fn run_parallel_with_reuse<F: ParallelObjectiveFunction>(
        self,
        objective_function: F,
    ) -> RestartResults {
        let mut function = Some(objective_function);
        self.run_internal(
            || function.take().unwrap(),
            true,
            |optimizer| optimizer.run_parallel(),
        )
    }

    /// Shared logic between `Self::run_*`
    fn run_internal<F, G, R>(
        mut self,
        mut get_objective_function: G,
        reuse_objective_function: bool,
        run: R,
    ) -> RestartResults
    where
        G: FnMut() -> F,
        R: Copy + Fn(&mut Optimizer<F>) -> TerminationReport,
    {
        // Print parameters before any runs
        if self.print_info {
            self.print_initial_info();
        }

        // Initialize results
        let time_started = Instant::now();
        let reason;
        let mut function_evals = 0;
        let mut runs = 0;
        let mut run_reasons = Vec::new();
        // For storing the objective function if it's being reused
        let mut objective_function = None;

        // Repeatedly restart the search
        loop {
            // Check if the `max_runs` setting of the restart strategy is zero to avoid always
            // running it once to find out
            if self.strategy.has_zero_max_runs() {
                reason = RestartStopReason::MaxRuns;
                break;
            }

            // Check RestartStopReason::MaxEvaluations
            if let Some(max_evaluations) = self.max_evaluations {
                if function_evals >= max_evaluations {
                    reason = RestartStopReason::MaxEvaluations;
                    break;
                }
            }

            // Check RestartStopReason::MaxTime if enabled
            if let Some(max_time) = self.max_time {
                if time_started.elapsed() >= max_time {
                    reason = RestartStopReason::MaxTime;
                    break;
                }
            }

            // Generate new parameters
            let initial_mean = self.generate_initial_mean();
            let seed = self.rng.gen();

            // Apply default configuration (may be overridden by individual restart strategies)
            let mut options = OptimizerOptions::new(self.dimensions)
                .initial_mean(initial_mean)
                .mode(self.mode)
                .seed(seed);
            options.search_bounds = Some(self.search_range.clone());
            options.max_generations = self.max_generations_per_run;
            options.fitness_target = self.fitness_target;

            // Cap each run's budget at whatever remains of the total allowance
            let remaining_evals = self
                .max_evaluations
                .map(|max| max.saturating_sub(function_evals));
            options.max_evaluations = match (remaining_evals, self.max_evaluations_per_run) {
                (Some(remaining), Some(max_per_run)) => Some(remaining.min(max_per_run)),
                (Some(evals), None) | (None, Some(evals)) => Some(evals),
                _ => None,
            };

            // Run the search
            let search_range_size = self.search_range.end() - self.search_range.start();
            // Reuse the objective function if it's stored or get a fresh one otherwise
            let function = objective_function
                .take()
                .unwrap_or_else(&mut get_objective_function);
            let run_with_print = |optimizer: &mut Optimizer<F>| {
                // Print initial parameters of the run
                if self.print_info {
                    print_run_info(runs + 1, optimizer.parameters());
                }

                run(optimizer)
            };
            let (optimizer, report, control) = self.strategy.next_run(
                options,
                search_range_size,
                function,
                run_with_print,
                &mut self.rng,
            );

            // Print results of the run
            if self.print_info {
                print_run_results(runs + 1, &report);
            }

            // Update results
            function_evals += report.evaluations;
            runs += 1;
            run_reasons.push(report.reason);

            if let Some(best) = report.overall_best.clone() {
                self.update_best_individual(best);
            }

            // Check RestartStopReason::FailedRun
            if report.status() == RunStatus::Failed {
                reason = RestartStopReason::FailedRun;
                break;
            }

            // Check RestartStopReason::FitnessTarget if enabled
            if report.reason == StopReason::FitnessTarget {
                reason = RestartStopReason::FitnessTarget;
                break;
            }

            // Check RestartStopReason::MaxRuns
            match control {
                RestartControl::Continue => (),
                RestartControl::MaxRunsReached => {
                    reason = RestartStopReason::MaxRuns;
                    break;
                }
            }

            // Reuse the objective function if enabled
            if reuse_objective_function {
                objective_function = Some(optimizer.into_objective_function());
            }
        }

        let results = RestartResults {
            best: self.overall_best,
            reason,
            run_reasons,
            function_evals,
            runs,
        };

        // Print overall results
        if self.print_info {
            results.print_results();
        }

        results
    }

    /// Updates the overall best individual
    fn update_best_individual(&mut self, individual: Individual) {
        match self.overall_best {
            Some(ref mut current_best) => {
                if self.mode.is_better(individual.value, current_best.value) {
                    *current_best = individual;
                }
            }
            None => self.overall_best = Some(individual),
        }
    }

    /// Prints various parameters of the `Restarter` and its `RestartStrategy`
    fn print_initial_info(&self) {
        let algorithm_name = self.strategy.get_algorithm_name();
        let parameters_str = self
            .strategy
            .get_parameters_as_strings()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        let search_range_str = format!(
            "[{}, {}]",
            self.search_range.start(),
            self.search_range.end()
        );

        println!(
            "{} with dimension={}, search_range={}, {}, seed={}",
            algorithm_name, self.dimensions, search_range_str, parameters_str, self.seed
        );
    }

    /// Generates a random initial mean in the search range and returns it
    fn generate_initial_mean(&mut self) -> DVector<f64> {
        DVector::from_iterator(
            self.dimensions,
            (0..self.dimensions).map(|_| self.rng.gen_range(self.search_range.clone())),
        )
    }
}

/// Prints various initial parameters of a run
fn print_run_info(run: usize, params: &Parameters) {
    println!(
        "Run {} parameters: lambda={}, sigma0={}, seed={}",
        run,
        params.lambda(),
        utils::format_num(params.initial_sigma(), 12),
        params.seed()
    );
}

/// Prints the results of a run
fn print_run_results(run: usize, report: &TerminationReport) {
    let best_value_str = report
        .overall_best
        .as_ref()
        .map(|ind| utils::format_num(ind.value, 19))
        .unwrap_or_else(|| "None".into());
    println!(
        "Run {} results: best f-val={}, stop reason=`{}`, f-evals={}",
        run, best_value_str, report.reason, report.evaluations
    );
}
