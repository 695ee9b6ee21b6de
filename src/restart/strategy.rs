//! Abstractions over different restart strategies

use rand_chacha::ChaCha12Rng;

use super::{Ipop, Local};
use crate::{Optimizer, OptimizerOptions, TerminationReport};

/// A type returned by restart strategies to allow them to control restart execution
#[derive(Clone, Copy, Debug)]
pub enum RestartControl {
    /// Continue executing more runs (if no termination criteria are met)
    Continue,
    /// Stop executing runs (the run that returns this will be the final one)
    MaxRunsReached,
}

impl RestartControl {
    /// Returns whether this `RestartControl` value represents an instruction to terminate the
    /// restart strategy
    #[cfg(test)]
    pub fn should_terminate(&self) -> bool {
        match *self {
            RestartControl::Continue => false,
            RestartControl::MaxRunsReached => true,
        }
    }
}

/// The strategy to use in performing automatic restarts. A good default choice is `Ipop`.
#[derive(Clone, Debug)]
pub enum RestartStrategy {
    /// See [`Local`].
    Local(Local),
    /// See [`Ipop`].
    Ipop(Ipop),
}

/// A trait implemented by all restart strategy types
pub trait Strategy {
    /// Returns whether the restart strategy has zero max runs and therefore should not be run at
    /// all. Normal termination is done with the `RestartControl` return value of
    /// `Strategy::next_run`.
    fn has_zero_max_runs(&self) -> bool;
    /// Configures and executes the next run (using `run`). Returns the final state of the run, its
    /// termination report, and an instruction for how/whether to proceed with future runs.
    ///
    /// - `default_options` is the default configuration for all runs, including a random initial
    /// mean and seed. Individual options such as the initial step size should be overridden if
    /// necessary, although `max_evaluations` and `max_generations` should only ever be decreased
    /// from their default values in order to respect their corresponding `Restarter` options.
    /// - `search_range_size` is the size of the search range of the restart strategy and can be
    /// used to calculate other options.
    /// - `rng` should be used to generate any random numbers used.
    fn next_run<F, R: FnOnce(&mut Optimizer<F>) -> TerminationReport>(
        &mut self,
        default_options: OptimizerOptions,
        search_range_size: f64,
        objective_function: F,
        run: R,
        rng: &mut ChaCha12Rng,
    ) -> (Optimizer<F>, TerminationReport, RestartControl);
    /// Returns the name of the restart strategy, e.g. `IPOP`.
    fn get_algorithm_name(&self) -> &'static str;
    /// Returns the parameters of the restart strategy in a name to value map.
    fn get_parameters_as_strings(&self) -> Vec<(String, String)>;
}

impl Strategy for RestartStrategy {
    fn has_zero_max_runs(&self) -> bool {
        match *self {
            RestartStrategy::Local(ref s) => s.has_zero_max_runs(),
            RestartStrategy::Ipop(ref s) => s.has_zero_max_runs(),
        }
    }

    fn next_run<F, R: FnOnce(&mut Optimizer<F>) -> TerminationReport>(
        &mut self,
        default_options: OptimizerOptions,
        search_range_size: f64,
        objective_function: F,
        run: R,
        rng: &mut ChaCha12Rng,
    ) -> (Optimizer<F>, TerminationReport, RestartControl) {
        match *self {
            RestartStrategy::Local(ref mut s) => s.next_run(
                default_options,
                search_range_size,
                objective_function,
                run,
                rng,
            ),
            RestartStrategy::Ipop(ref mut s) => s.next_run(
                default_options,
                search_range_size,
                objective_function,
                run,
                rng,
            ),
        }
    }

    fn get_algorithm_name(&self) -> &'static str {
        match *self {
            RestartStrategy::Local(ref s) => s.get_algorithm_name(),
            RestartStrategy::Ipop(ref s) => s.get_algorithm_name(),
        }
    }

    fn get_parameters_as_strings(&self) -> Vec<(String, String)> {
        match *self {
            RestartStrategy::Local(ref s) => s.get_parameters_as_strings(),
            RestartStrategy::Ipop(ref s) => s.get_parameters_as_strings(),
        }
    }
}
