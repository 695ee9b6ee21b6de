//! Convenience functions for easier use of the library.

use nalgebra::DVector;

use crate::{
    Individual, Mode, ObjectiveFunction, OptimizerOptions, ParallelObjectiveFunction,
    DEFAULT_PRINT_GAP_EVALS,
};

const INVALID_OPTIONS: &str = "Invalid options";
const FAILED_RUN: &str = "The run failed before any candidate could be evaluated";

/// Minimizes the value of `f` and returns the best solution found.
///
/// Equivalent to simply using the default
/// [`OptimizerOptions`][crate::OptimizerOptions] with printing enabled.
/// [`OptimizerOptions`][crate::OptimizerOptions] should be used instead if
/// further configuration is desired.
///
/// # Panics
///
/// Panics if `initial_mean` is empty, if `initial_step_size` is not positive
/// and finite, or if the run fails before any candidate could be evaluated.
///
/// # Examples
///
/// ```
/// use popbox::DVector;
///
/// let sphere = |x: &DVector<f64>| x.iter().map(|xi| xi.powi(2)).sum();
/// let dim = 10;
/// let solution = popbox::fmin(sphere, vec![5.0; dim], 1.0);
/// ```
pub fn fmin<F, V>(f: F, initial_mean: V, initial_step_size: f64) -> Individual
where
    F: ObjectiveFunction,
    V: Into<DVector<f64>>,
{
    let initial_mean = initial_mean.into();
    OptimizerOptions::new(initial_mean.len())
        .initial_mean(initial_mean)
        .initial_step_size(initial_step_size)
        .enable_printing(DEFAULT_PRINT_GAP_EVALS)
        .build(f)
        .expect(INVALID_OPTIONS)
        .run()
        .overall_best
        .expect(FAILED_RUN)
}

/// Like [`fmin`], but executes the objective function in parallel using
/// multiple threads.
///
/// Requires that `F` implements
/// [`ParallelObjectiveFunction`][crate::ParallelObjectiveFunction].
///
/// # Examples
///
/// ```
/// use popbox::DVector;
///
/// let sphere = |x: &DVector<f64>| x.iter().map(|xi| xi.powi(2)).sum();
/// let dim = 10;
/// let solution = popbox::fmin_parallel(sphere, vec![5.0; dim], 1.0);
/// ```
pub fn fmin_parallel<F, V>(f: F, initial_mean: V, initial_step_size: f64) -> Individual
where
    F: ParallelObjectiveFunction,
    V: Into<DVector<f64>>,
{
    let initial_mean = initial_mean.into();
    OptimizerOptions::new(initial_mean.len())
        .initial_mean(initial_mean)
        .initial_step_size(initial_step_size)
        .enable_printing(DEFAULT_PRINT_GAP_EVALS)
        .build(f)
        .expect(INVALID_OPTIONS)
        .run_parallel()
        .overall_best
        .expect(FAILED_RUN)
}

/// Maximizes the value of `f` and returns the best solution found.
///
/// Equivalent to simply using the default
/// [`OptimizerOptions`][crate::OptimizerOptions] with the mode set to
/// [`Mode::Maximize`][crate::Mode::Maximize] and printing enabled.
/// [`OptimizerOptions`][crate::OptimizerOptions] should be used instead if
/// further configuration is desired.
///
/// # Panics
///
/// Panics under the same conditions as [`fmin`].
///
/// # Examples
///
/// ```
/// use popbox::DVector;
///
/// let function = |x: &DVector<f64>| 1.0 / x.magnitude();
/// let dim = 10;
/// let solution = popbox::fmax(function, vec![5.0; dim], 1.0);
/// ```
pub fn fmax<F, V>(f: F, initial_mean: V, initial_step_size: f64) -> Individual
where
    F: ObjectiveFunction,
    V: Into<DVector<f64>>,
{
    let initial_mean = initial_mean.into();
    OptimizerOptions::new(initial_mean.len())
        .initial_mean(initial_mean)
        .initial_step_size(initial_step_size)
        .mode(Mode::Maximize)
        .enable_printing(DEFAULT_PRINT_GAP_EVALS)
        .build(f)
        .expect(INVALID_OPTIONS)
        .run()
        .overall_best
        .expect(FAILED_RUN)
}

/// Like [`fmax`], but executes the objective function in parallel using
/// multiple threads.
///
/// Requires that `F` implements
/// [`ParallelObjectiveFunction`][crate::ParallelObjectiveFunction].
///
/// # Examples
///
/// ```
/// use popbox::DVector;
///
/// let function = |x: &DVector<f64>| 1.0 / x.magnitude();
/// let dim = 10;
/// let solution = popbox::fmax_parallel(function, vec![5.0; dim], 1.0);
/// ```
pub fn fmax_parallel<F, V>(f: F, initial_mean: V, initial_step_size: f64) -> Individual
where
    F: ParallelObjectiveFunction,
    V: Into<DVector<f64>>,
{
    let initial_mean = initial_mean.into();
    OptimizerOptions::new(initial_mean.len())
        .initial_mean(initial_mean)
        .initial_step_size(initial_step_size)
        .mode(Mode::Maximize)
        .enable_printing(DEFAULT_PRINT_GAP_EVALS)
        .build(f)
        .expect(INVALID_OPTIONS)
        .run_parallel()
        .overall_best
        .expect(FAILED_RUN)
}
