//! Detection of conditions that end a run. See [`StopReason`] for the full
//! set of conditions.

use std::fmt::{self, Debug};

use crate::evaluation::{EvaluatedPoint, EvaluationBudget};
use crate::history::History;
use crate::parameters::Parameters;
use crate::state::SearchState;
use crate::utils;

/// The reason a run stopped.
///
/// The convergence and resource reasons are ordinary outcomes, while the
/// failure reasons protect against numerical instability and misbehaving
/// objective functions. Each reason maps into a coarse [`RunStatus`] via
/// [`StopReason::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The best function value reached the configured fitness target.
    FitnessTarget,
    /// The range of best function values over recent generations and the
    /// range of function values within the current generation both lie below
    /// `tol_fun`. Indicates that the function value has stopped changing
    /// significantly.
    TolFun,
    /// The standard deviation of the distribution is smaller than `tol_x` in
    /// every coordinate and the evolution path is similarly short. Indicates
    /// that the distribution has collapsed onto a point.
    TolX,
    /// Steps at the current distribution scale no longer change the mean at
    /// floating-point precision, along a principal axis or a coordinate
    /// axis. No further progress is possible.
    PrecisionLimit,
    /// The best function value of any generation has not improved over many
    /// consecutive generations.
    Stagnation,
    /// The evaluation budget has been fully consumed.
    BudgetExhausted,
    /// The maximum number of generations has been reached.
    MaxGenerations,
    /// The run was cancelled from another thread.
    Cancelled,
    /// The objective function returned an error or panicked.
    ObjectiveFailure,
    /// The objective function returned a non-finite value.
    InvalidFitness,
    /// The covariance matrix could no longer be decomposed into a valid
    /// sampling transform.
    DegenerateDistribution,
    /// The step size, mean, or an evolution path became non-finite or left
    /// its working range.
    NumericalInstability,
    /// The condition number of the covariance matrix exceeded
    /// `tol_condition_cov` or became non-normal.
    IllConditioned,
}

impl StopReason {
    /// Returns the status a run ends in when it stops for this reason.
    pub fn status(&self) -> RunStatus {
        match self {
            StopReason::FitnessTarget
            | StopReason::TolFun
            | StopReason::TolX
            | StopReason::PrecisionLimit => RunStatus::Converged,
            StopReason::Stagnation => RunStatus::Stagnated,
            StopReason::BudgetExhausted | StopReason::MaxGenerations => {
                RunStatus::BudgetExhausted
            }
            StopReason::Cancelled => RunStatus::Cancelled,
            StopReason::ObjectiveFailure
            | StopReason::InvalidFitness
            | StopReason::DegenerateDistribution
            | StopReason::NumericalInstability
            | StopReason::IllConditioned => RunStatus::Failed,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self, fmt)
    }
}

/// The coarse outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// The run has not stopped yet.
    Running,
    /// The run converged on a solution.
    Converged,
    /// The run used up its evaluation or generation allowance.
    BudgetExhausted,
    /// The run stopped improving well before converging.
    Stagnated,
    /// The run was cancelled.
    Cancelled,
    /// The run was aborted by a numerical problem or an objective function
    /// failure.
    Failed,
}

impl RunStatus {
    /// Returns whether the run has stopped.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self, fmt)
    }
}

/// Returns the default number of recent generations examined by the `TolFun`
/// check.
pub(crate) fn default_tol_fun_window(dim: usize, lambda: usize) -> usize {
    10 + (30.0 * dim as f64 / lambda as f64).ceil() as usize
}

/// Returns the default number of generations without improvement tolerated
/// before a run counts as stagnated.
pub(crate) fn default_stagnation_window(dim: usize, lambda: usize) -> usize {
    100 + (100.0 * (dim as f64).powf(1.5) / lambda as f64).ceil() as usize
}

/// Checks the budget, state, and function value history against every
/// stopping condition and returns the reasons that are met, ordered from most
/// to least meaningful to report.
///
/// `individuals` is the latest evaluated generation and must be non-empty.
pub(crate) fn check_termination(
    budget: &EvaluationBudget,
    parameters: &Parameters,
    state: &SearchState,
    history: &History,
    individuals: &[EvaluatedPoint],
) -> Vec<StopReason> {
    let mut result = Vec::new();

    let dim = parameters.dim();
    let mode = parameters.mode();
    let tol_fun = parameters.tol_fun();
    let tol_x = parameters.tol_x();

    let mean = state.mean();
    let cov = state.covariance().cov();
    let eigenvectors = state.covariance().eigenvectors();
    let sqrt_eigenvalues = state.covariance().sqrt_eigenvalues();
    let sigma = state.sigma();
    let path_c = state.path_c();

    // Check StopReason::FitnessTarget
    if let Some(target) = parameters.fitness_target() {
        if individuals
            .iter()
            .any(|ind| mode.reached_target(ind.value(), target))
        {
            result.push(StopReason::FitnessTarget);
        }
    }

    // Check StopReason::TolFun
    let window = parameters.tol_fun_window();

    if history.best_function_values().len() >= window {
        let range_history =
            utils::range(history.best_function_values().iter().take(window).cloned()).unwrap();
        let range_current = utils::range(individuals.iter().map(|p| p.value())).unwrap();

        if range_history < tol_fun && range_current < tol_fun {
            result.push(StopReason::TolFun);
        }
    }

    // Check StopReason::TolX
    if (0..dim).all(|i| (sigma * cov[(i, i)]).abs() < tol_x)
        && path_c.iter().all(|x| (sigma * *x).abs() < tol_x)
    {
        result.push(StopReason::TolX);
    }

    // Check StopReason::PrecisionLimit
    // Cycles through the principal axes to avoid checking every column every
    // generation
    let index_to_check = state.generation() % dim;

    let no_effect_axis_check = 0.1
        * sigma
        * sqrt_eigenvalues[(index_to_check, index_to_check)]
        * eigenvectors.column(index_to_check);

    let no_effect_axis = mean == &(mean + no_effect_axis_check);
    let no_effect_coord = (0..dim).any(|i| mean[i] == mean[i] + 0.2 * sigma * cov[(i, i)]);

    if no_effect_axis || no_effect_coord {
        result.push(StopReason::PrecisionLimit);
    }

    // Check StopReason::Stagnation
    if history.generations_since_improvement() >= parameters.stagnation_window() {
        result.push(StopReason::Stagnation);
    }

    // Check StopReason::BudgetExhausted
    if budget.is_exhausted() {
        result.push(StopReason::BudgetExhausted);
    }

    // Check StopReason::MaxGenerations
    if let Some(max_generations) = parameters.max_generations() {
        if state.generation() >= max_generations {
            result.push(StopReason::MaxGenerations);
        }
    }

    // Check StopReason::IllConditioned
    let cond = state.axis_ratio().powi(2);

    if !cond.is_normal() || cond > parameters.tol_condition_cov() {
        result.push(StopReason::IllConditioned);
    }

    result
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;
    use crate::matrix::SquareMatrix;
    use crate::mode::Mode;
    use crate::options::OptimizerOptions;
    use crate::sampling::Candidate;

    const DIM: usize = 2;
    const LAMBDA: usize = 6;

    fn get_options() -> OptimizerOptions {
        OptimizerOptions::new(DIM)
            .population_size(LAMBDA)
            .fitness_target(1e-12)
    }

    fn get_parameters(options: &OptimizerOptions) -> Parameters {
        Parameters::from_options(options, 0)
    }

    fn get_state() -> SearchState {
        SearchState::new(vec![0.0; DIM].into(), 0.5)
    }

    fn get_dummy_generation(function_value: f64) -> Vec<EvaluatedPoint> {
        (0..LAMBDA)
            .map(|_| {
                EvaluatedPoint::new(
                    Candidate {
                        point: DVector::zeros(DIM),
                        step: DVector::zeros(DIM),
                        sigma_factor: 1.0,
                    },
                    function_value,
                )
            })
            .collect()
    }

    #[test]
    fn test_check_termination_none() {
        // A fresh state should not meet any stopping condition
        let reasons = check_termination(
            &EvaluationBudget::restore(50, Some(100)),
            &get_parameters(&get_options()),
            &get_state(),
            &History::new(Mode::Minimize),
            &get_dummy_generation(1.0),
        );

        assert!(reasons.is_empty());
    }

    #[test]
    fn test_check_termination_fitness_target() {
        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&get_options()),
            &get_state(),
            &History::new(Mode::Minimize),
            &get_dummy_generation(1e-16),
        );

        assert_eq!(vec![StopReason::FitnessTarget], reasons);
    }

    #[test]
    fn test_check_termination_fitness_target_maximize() {
        let options = get_options().mode(Mode::Maximize).fitness_target(10.0);

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&options),
            &get_state(),
            &History::new(Mode::Maximize),
            &get_dummy_generation(20.0),
        );

        assert_eq!(vec![StopReason::FitnessTarget], reasons);
    }

    #[test]
    fn test_check_termination_tol_fun() {
        // Small ranges of current and historical function values produce
        // TolFun
        let mut history = History::new(Mode::Minimize);
        history.mut_best_function_values().extend(vec![1.0; 100]);
        history.mut_best_function_values().push_front(1.0 + 1e-13);

        let current_value = history.best_function_values()[0];

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&get_options()),
            &get_state(),
            &history,
            &get_dummy_generation(current_value),
        );

        assert_eq!(vec![StopReason::TolFun], reasons);
    }

    #[test]
    fn test_check_termination_tol_x() {
        // A small step size and evolution path produce TolX
        let mut state = get_state();
        state.sigma = 1e-13;

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&get_options()),
            &state,
            &History::new(Mode::Minimize),
            &get_dummy_generation(1.0),
        );

        assert_eq!(vec![StopReason::TolX], reasons);
    }

    #[test]
    fn test_check_termination_precision_limit_coord() {
        // A coordinate axis scale too small to move the mean produces
        // PrecisionLimit
        let mut state = get_state();
        state.mean = vec![100.0; DIM].into();

        let eigenvectors = SquareMatrix::<f64>::identity(DIM, DIM);
        let sqrt_eigenvalues = SquareMatrix::from_diagonal(&vec![1e-4, 1e-10].into());
        let cov = &eigenvectors * sqrt_eigenvalues.pow(2) * eigenvectors.transpose();
        state.cov.set_cov(cov, true).unwrap();

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&get_options()),
            &state,
            &History::new(Mode::Minimize),
            &get_dummy_generation(1.0),
        );

        assert_eq!(vec![StopReason::PrecisionLimit], reasons);
    }

    #[test]
    fn test_check_termination_precision_limit_axis() {
        // A principal axis scale too small to move the mean produces
        // PrecisionLimit
        let mut state = get_state();
        state.mean = vec![100.0; DIM].into();
        state.sigma = 1e-10;

        let eigenvectors = SquareMatrix::from_columns(&[
            DVector::from(vec![3.0, 2.0]).normalize(),
            DVector::from(vec![-2.0, 3.0]).normalize(),
        ]);
        let sqrt_eigenvalues = SquareMatrix::from_diagonal(&vec![1e-1, 1e-6].into());
        let cov = &eigenvectors * sqrt_eigenvalues.pow(2) * eigenvectors.transpose();
        state.cov.set_cov(cov, true).unwrap();

        // The axis check cycles through the axes by generation, so check
        // every axis
        let mut terminated = false;
        for generation in 0..DIM {
            state.generation = generation;

            let reasons = check_termination(
                &EvaluationBudget::new(None),
                &get_parameters(&get_options()),
                &state,
                &History::new(Mode::Minimize),
                &get_dummy_generation(1.0),
            );

            if !reasons.is_empty() {
                assert_eq!(vec![StopReason::PrecisionLimit], reasons);
                terminated = true;
            }
        }
        assert!(terminated);
    }

    #[test]
    fn test_check_termination_stagnation() {
        let options = get_options().stagnation_window(10);

        let mut history = History::new(Mode::Minimize);
        *history.mut_generations_since_improvement() = 10;

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&options),
            &get_state(),
            &history,
            &get_dummy_generation(1.0),
        );

        assert_eq!(vec![StopReason::Stagnation], reasons);
    }

    #[test]
    fn test_check_termination_budget_exhausted() {
        let reasons = check_termination(
            &EvaluationBudget::restore(100, Some(100)),
            &get_parameters(&get_options()),
            &get_state(),
            &History::new(Mode::Minimize),
            &get_dummy_generation(1.0),
        );

        assert_eq!(vec![StopReason::BudgetExhausted], reasons);
    }

    #[test]
    fn test_check_termination_max_generations() {
        let options = get_options().max_generations(100);

        let mut state = get_state();
        state.generation = 100;

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&options),
            &state,
            &History::new(Mode::Minimize),
            &get_dummy_generation(1.0),
        );

        assert_eq!(vec![StopReason::MaxGenerations], reasons);
    }

    #[test]
    fn test_check_termination_ill_conditioned() {
        // A huge spread between the largest and smallest axis scales
        // produces IllConditioned
        let mut state = get_state();
        state
            .cov
            .set_cov(
                SquareMatrix::from_iterator(DIM, DIM, [0.99, 0.0, 0.0, 1e14]),
                true,
            )
            .unwrap();

        let reasons = check_termination(
            &EvaluationBudget::new(None),
            &get_parameters(&get_options()),
            &state,
            &History::new(Mode::Minimize),
            &get_dummy_generation(1.0),
        );

        assert_eq!(vec![StopReason::IllConditioned], reasons);
    }

    #[test]
    fn test_check_termination_precedence() {
        // When several conditions hold at once, convergence reasons come
        // before resource bounds
        let options = get_options().max_generations(5);

        let mut state = get_state();
        state.generation = 5;

        let reasons = check_termination(
            &EvaluationBudget::restore(100, Some(100)),
            &get_parameters(&options),
            &state,
            &History::new(Mode::Minimize),
            &get_dummy_generation(1e-16),
        );

        assert_eq!(
            vec![
                StopReason::FitnessTarget,
                StopReason::BudgetExhausted,
                StopReason::MaxGenerations,
            ],
            reasons,
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(RunStatus::Converged, StopReason::FitnessTarget.status());
        assert_eq!(RunStatus::Converged, StopReason::TolFun.status());
        assert_eq!(RunStatus::Converged, StopReason::TolX.status());
        assert_eq!(RunStatus::Converged, StopReason::PrecisionLimit.status());
        assert_eq!(RunStatus::Stagnated, StopReason::Stagnation.status());
        assert_eq!(
            RunStatus::BudgetExhausted,
            StopReason::BudgetExhausted.status()
        );
        assert_eq!(
            RunStatus::BudgetExhausted,
            StopReason::MaxGenerations.status()
        );
        assert_eq!(RunStatus::Cancelled, StopReason::Cancelled.status());
        assert_eq!(RunStatus::Failed, StopReason::ObjectiveFailure.status());
        assert_eq!(RunStatus::Failed, StopReason::InvalidFitness.status());
        assert_eq!(
            RunStatus::Failed,
            StopReason::DegenerateDistribution.status()
        );
        assert_eq!(
            RunStatus::Failed,
            StopReason::NumericalInstability.status()
        );
        assert_eq!(RunStatus::Failed, StopReason::IllConditioned.status());

        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Converged.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
