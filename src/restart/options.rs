//! Initialization of [`Restarter`][crate::restart::Restarter].

use std::ops::RangeInclusive;
use std::time::Duration;

use super::{RestartStrategy, Restarter};
use crate::Mode;

/// Represents invalid options for a [`Restarter`]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum InvalidRestartOptionsError {
    /// The number of dimensions is set to zero.
    Dimensions,
    /// The search range is empty, infinite, or NaN.
    SearchRange,
}

/// Represents invalid options for a restart strategy
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum InvalidRestartStrategyOptionsError {
    /// The initial step size multiplier is non-positive, infinite, or NaN.
    InitialStepSize,
    /// The population size is too small (must be at least 4).
    PopulationSize,
}

/// A builder for [`Restarter`]. Used to adjust how runs are performed and when to
/// terminate them.
///
/// # Examples
///
/// ```
/// use popbox::restart::{RestartOptions, RestartStrategy};
///
/// let strategy = RestartStrategy::Ipop(Default::default());
/// let restarter = RestartOptions::new(10, -5.0..=5.0, strategy)
///     .fitness_target(1e-10)
///     .max_evaluations(100_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct RestartOptions {
    /// The restart strategy to use
    pub strategy: RestartStrategy,
    /// The number of dimensions to search
    pub dimensions: usize,
    /// The range in which to generate the initial mean for each run (applies to each
    /// dimension individually)
    pub search_range: RangeInclusive<f64>,
    /// Whether the objective function is minimized or maximized
    /// (see [`OptimizerOptions::mode`][crate::OptimizerOptions::mode])
    pub mode: Mode,
    /// The target objective function value (see
    /// [`OptimizerOptions::fitness_target`][crate::OptimizerOptions::fitness_target]).
    /// All runs are stopped if it is reached.
    pub fitness_target: Option<f64>,
    /// The total number of objective function evaluations allowed across all runs
    pub max_evaluations: Option<usize>,
    /// The time limit for all runs combined
    pub max_time: Option<Duration>,
    /// The evaluation limit for each run individually (see
    /// [`OptimizerOptions::max_evaluations`][crate::OptimizerOptions::max_evaluations])
    pub max_evaluations_per_run: Option<usize>,
    /// The generation limit for each run individually (see
    /// [`OptimizerOptions::max_generations`][crate::OptimizerOptions::max_generations])
    pub max_generations_per_run: Option<usize>,
    /// Whether to print info about each run (see
    /// [`OptimizerOptions::enable_printing`][crate::OptimizerOptions::enable_printing])
    pub enable_printing: bool,
    /// The seed for the RNG from which each run's seed is derived
    pub seed: Option<u64>,
}

impl RestartOptions {
    /// Returns a new `RestartOptions` with default values. The initial mean for each
    /// run is generated uniformly within `search_range` in each dimension, so the
    /// range should generally cover the suspected region of the global optimum.
    pub fn new(
        dimensions: usize,
        search_range: RangeInclusive<f64>,
        strategy: RestartStrategy,
    ) -> Self {
        Self {
            strategy,
            dimensions,
            search_range,
            mode: Mode::Minimize,
            fitness_target: None,
            max_evaluations: None,
            max_time: None,
            max_evaluations_per_run: None,
            max_generations_per_run: None,
            enable_printing: false,
            seed: None,
        }
    }

    /// Sets whether the objective function is minimized or maximized. Default value is
    /// `Mode::Minimize`.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the target objective function value. All runs are stopped if it is reached.
    pub fn fitness_target(mut self, fitness_target: f64) -> Self {
        self.fitness_target = Some(fitness_target);
        self
    }

    /// Sets the total number of objective function evaluations allowed across all runs.
    /// The evaluation budget of each run is capped at whatever remains of this
    /// allowance.
    pub fn max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    /// Sets the time limit for all runs combined. The limit is only checked between
    /// runs, so it may be exceeded by the length of one run.
    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the evaluation limit for each run individually.
    pub fn max_evaluations_per_run(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations_per_run = Some(max_evaluations);
        self
    }

    /// Sets the generation limit for each run individually.
    pub fn max_generations_per_run(mut self, max_generations: usize) -> Self {
        self.max_generations_per_run = Some(max_generations);
        self
    }

    /// Sets whether to print info about each run.
    pub fn enable_printing(mut self, enable_printing: bool) -> Self {
        self.enable_printing = enable_printing;
        self
    }

    /// Sets the seed for the RNG from which each run's seed is derived. Can be used
    /// for deterministic runs. By default a random seed is used.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attempts to build a [`Restarter`] using the chosen options.
    pub fn build(self) -> Result<Restarter, InvalidRestartOptionsError> {
        Restarter::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_strategy() -> RestartStrategy {
        RestartStrategy::Ipop(Default::default())
    }

    #[test]
    fn test_build() {
        assert!(RestartOptions::new(2, -1.0..=1.0, get_strategy())
            .build()
            .is_ok());
        // Flipped ranges are corrected rather than rejected
        assert!(RestartOptions::new(2, 1.0..=-1.0, get_strategy())
            .build()
            .is_ok());
        assert_eq!(
            Err(InvalidRestartOptionsError::Dimensions),
            RestartOptions::new(0, -1.0..=1.0, get_strategy())
                .build()
                .map(|_| ())
        );
        assert_eq!(
            Err(InvalidRestartOptionsError::SearchRange),
            RestartOptions::new(2, 1.0..=1.0, get_strategy())
                .build()
                .map(|_| ())
        );
        assert_eq!(
            Err(InvalidRestartOptionsError::SearchRange),
            RestartOptions::new(2, f64::NEG_INFINITY..=1.0, get_strategy())
                .build()
                .map(|_| ())
        );
        assert_eq!(
            Err(InvalidRestartOptionsError::SearchRange),
            RestartOptions::new(2, f64::NAN..=1.0, get_strategy())
                .build()
                .map(|_| ())
        );
    }
}
