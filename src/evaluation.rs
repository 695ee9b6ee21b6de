//! Evaluation of sampled points against the objective function, including
//! budget accounting and failure policies.

use nalgebra::DVector;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::mode::Mode;
use crate::objective_function::{ObjectiveError, ObjectiveFunction, ParallelObjectiveFunction};
use crate::parameters::Parameters;
use crate::sampling::{Candidate, DegenerateDistributionError, Sampler};
use crate::state::SearchState;

/// How many failed evaluations are tolerated per generation under
/// [`FailurePolicy::SkipAndResample`], as a multiple of the population size
const RESAMPLE_CAP_FACTOR: usize = 10;

/// What to do when the objective function returns an error or panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abort the run on the first failed evaluation.
    FailFast,
    /// Discard the failed point and sample a replacement, up to a bounded
    /// number of retries per generation.
    SkipAndResample,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

/// What to do when the objective function returns a non-finite fitness value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidFitnessPolicy {
    /// Abort the run.
    Reject,
    /// Rank the point as the worst possible value for the optimization mode.
    TreatAsWorst,
}

impl Default for InvalidFitnessPolicy {
    fn default() -> Self {
        InvalidFitnessPolicy::Reject
    }
}

/// An error produced by a single objective function evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum EvaluationError {
    /// The evaluation budget was already fully consumed.
    BudgetExceeded,
    /// The objective function returned an error or panicked.
    ObjectiveFailure(ObjectiveError),
    /// The objective function returned a non-finite fitness value.
    InvalidFitness(f64),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvaluationError::BudgetExceeded => {
                write!(f, "the evaluation budget has been exhausted")
            }
            EvaluationError::ObjectiveFailure(error) => write!(f, "{}", error),
            EvaluationError::InvalidFitness(value) => {
                write!(f, "the objective function returned a non-finite value ({})", value)
            }
        }
    }
}

impl std::error::Error for EvaluationError {}

impl From<ObjectiveError> for EvaluationError {
    fn from(error: ObjectiveError) -> Self {
        EvaluationError::ObjectiveFailure(error)
    }
}

/// Tracks the number of objective function evaluations consumed by a run.
///
/// The count is atomic so that evaluations performed on worker threads can be
/// recorded concurrently, and it is never allowed to exceed the maximum.
#[derive(Debug)]
pub(crate) struct EvaluationBudget {
    /// The number of evaluations consumed so far
    consumed: AtomicUsize,
    /// The maximum number of evaluations allowed, or `None` for no limit
    max: Option<usize>,
}

impl EvaluationBudget {
    pub fn new(max: Option<usize>) -> Self {
        Self::restore(0, max)
    }

    /// Returns a budget with `consumed` evaluations already recorded, used
    /// when resuming a run from a checkpoint.
    pub fn restore(consumed: usize, max: Option<usize>) -> Self {
        Self {
            consumed: AtomicUsize::new(consumed),
            max,
        }
    }

    /// Returns the number of evaluations consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Returns the maximum number of evaluations, or `None` if unlimited.
    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Returns the number of evaluations left, or `None` if unlimited.
    pub fn remaining(&self) -> Option<usize> {
        self.max.map(|max| max.saturating_sub(self.consumed()))
    }

    /// Returns whether every allowed evaluation has been consumed.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.remaining(), Some(0))
    }

    /// Records one evaluation and returns `true`, or returns `false` without
    /// recording anything if the budget is already exhausted.
    pub fn try_consume(&self) -> bool {
        match self.max {
            Some(max) => self
                .consumed
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |consumed| {
                    (consumed < max).then(|| consumed + 1)
                })
                .is_ok(),
            None => {
                self.consumed.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }
}

/// A sampled point with its evaluated fitness value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EvaluatedPoint {
    /// The point in the search space
    point: DVector<f64>,
    /// The scaled step from the distribution mean used to produce the point
    step: DVector<f64>,
    /// The per-point step size factor the step was scaled by
    sigma_factor: f64,
    /// The fitness value of the point
    value: f64,
}

impl EvaluatedPoint {
    pub fn new(candidate: Candidate, value: f64) -> Self {
        Self {
            point: candidate.point,
            step: candidate.step,
            sigma_factor: candidate.sigma_factor,
            value,
        }
    }

    pub fn point(&self) -> &DVector<f64> {
        &self.point
    }

    pub fn step(&self) -> &DVector<f64> {
        &self.step
    }

    pub fn sigma_factor(&self) -> f64 {
        self.sigma_factor
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// An error that aborted the evaluation of a generation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GenerationError {
    /// The search distribution could not be sampled
    DegenerateDistribution(DegenerateDistributionError),
    /// An evaluation failed and the configured policies made it fatal
    Evaluation(EvaluationError),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerationError::DegenerateDistribution(error) => write!(f, "{}", error),
            GenerationError::Evaluation(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<DegenerateDistributionError> for GenerationError {
    fn from(error: DegenerateDistributionError) -> Self {
        GenerationError::DegenerateDistribution(error)
    }
}

impl From<EvaluationError> for GenerationError {
    fn from(error: EvaluationError) -> Self {
        GenerationError::Evaluation(error)
    }
}

/// Evaluates sampled points against the objective function while enforcing
/// the evaluation budget and the configured failure policies.
pub(crate) struct Evaluator<F> {
    objective_function: F,
    budget: EvaluationBudget,
    mode: Mode,
    failure_policy: FailurePolicy,
    invalid_fitness_policy: InvalidFitnessPolicy,
    /// Dedicated pool for parallel evaluation, or `None` to use the global one
    thread_pool: Option<ThreadPool>,
}

impl<F> Evaluator<F> {
    pub fn new(
        objective_function: F,
        budget: EvaluationBudget,
        mode: Mode,
        failure_policy: FailurePolicy,
        invalid_fitness_policy: InvalidFitnessPolicy,
        thread_pool: Option<ThreadPool>,
    ) -> Self {
        Self {
            objective_function,
            budget,
            mode,
            failure_policy,
            invalid_fitness_policy,
            thread_pool,
        }
    }

    pub fn budget(&self) -> &EvaluationBudget {
        &self.budget
    }

    pub fn objective_function(&self) -> &F {
        &self.objective_function
    }

    pub fn into_objective_function(self) -> F {
        self.objective_function
    }

    /// Converts the raw outcome of one objective function call into a fitness
    /// value, applying the invalid fitness policy.
    fn normalize_value(
        &self,
        result: thread::Result<Result<f64, ObjectiveError>>,
    ) -> Result<f64, EvaluationError> {
        let value = match result {
            Ok(Ok(value)) => value,
            Ok(Err(error)) => return Err(error.into()),
            Err(payload) => {
                let message = if let Some(text) = payload.downcast_ref::<&str>() {
                    format!("the objective function panicked: {}", text)
                } else if let Some(text) = payload.downcast_ref::<String>() {
                    format!("the objective function panicked: {}", text)
                } else {
                    "the objective function panicked".to_string()
                };
                return Err(ObjectiveError::new(message).into());
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            match self.invalid_fitness_policy {
                InvalidFitnessPolicy::Reject => Err(EvaluationError::InvalidFitness(value)),
                InvalidFitnessPolicy::TreatAsWorst => Ok(self.mode.worst()),
            }
        }
    }

    /// Decides whether a failed evaluation aborts the generation or leaves a
    /// slot to be resampled.
    ///
    /// Only objective function failures are recoverable. Non-finite fitness
    /// values reaching this point mean the policy is
    /// [`InvalidFitnessPolicy::Reject`], which is always fatal.
    fn handle_failure(
        &self,
        error: EvaluationError,
        failures: &mut usize,
        resample_cap: usize,
    ) -> Result<(), GenerationError> {
        let recoverable = self.failure_policy == FailurePolicy::SkipAndResample
            && matches!(error, EvaluationError::ObjectiveFailure(_));

        *failures += 1;

        if recoverable && *failures <= resample_cap {
            Ok(())
        } else {
            Err(error.into())
        }
    }

    /// Draws replacement candidates for discarded slots, clamped to the
    /// remaining evaluation budget.
    fn resample(
        &self,
        sampler: &mut Sampler,
        state: &SearchState,
        parameters: &Parameters,
        count: usize,
    ) -> Result<Vec<Candidate>, DegenerateDistributionError> {
        let granted = match self.budget.remaining() {
            Some(remaining) => count.min(remaining),
            None => count,
        };

        if granted == 0 {
            Ok(Vec::new())
        } else {
            sampler.sample(state, parameters, granted)
        }
    }
}

impl<F: ObjectiveFunction> Evaluator<F> {
    /// Evaluates a single point, consuming one evaluation from the budget.
    ///
    /// Panics in the objective function are caught and reported as
    /// [`EvaluationError::ObjectiveFailure`].
    pub fn evaluate(&mut self, point: &DVector<f64>) -> Result<f64, EvaluationError> {
        if !self.budget.try_consume() {
            return Err(EvaluationError::BudgetExceeded);
        }

        let objective_function = &mut self.objective_function;
        let result = panic::catch_unwind(AssertUnwindSafe(|| objective_function.evaluate(point)));

        self.normalize_value(result)
    }

    /// Samples and evaluates one generation of `count` points and returns
    /// them ranked from best to worst.
    ///
    /// Failed evaluations are handled according to the failure policies, and
    /// resampled replacements never exceed the remaining budget, so fewer
    /// than `count` points may be returned.
    pub fn evaluate_generation(
        &mut self,
        sampler: &mut Sampler,
        state: &SearchState,
        parameters: &Parameters,
        count: usize,
    ) -> Result<Vec<EvaluatedPoint>, GenerationError> {
        let resample_cap = RESAMPLE_CAP_FACTOR * parameters.lambda();
        let mut points = Vec::with_capacity(count);
        let mut failures = 0;

        let mut pending = sampler.sample(state, parameters, count)?;

        while !pending.is_empty() {
            let mut discarded = 0;

            for candidate in pending {
                match self.evaluate(&candidate.point) {
                    Ok(value) => points.push(EvaluatedPoint::new(candidate, value)),
                    Err(error) => {
                        self.handle_failure(error, &mut failures, resample_cap)?;
                        discarded += 1;
                    }
                }
            }

            pending = self.resample(sampler, state, parameters, discarded)?;
        }

        Ok(rank(points, self.mode))
    }
}

impl<F: ParallelObjectiveFunction> Evaluator<F> {
    /// Like [`Evaluator::evaluate`], but usable from multiple threads at
    /// once.
    pub fn evaluate_parallel(&self, point: &DVector<f64>) -> Result<f64, EvaluationError> {
        if !self.budget.try_consume() {
            return Err(EvaluationError::BudgetExceeded);
        }

        let objective_function = &self.objective_function;
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| objective_function.evaluate_parallel(point)));

        self.normalize_value(result)
    }

    /// Like [`Evaluator::evaluate_generation`], but evaluates the points of
    /// each batch in parallel.
    ///
    /// Points are ranked with ties broken by sampling order, so the result is
    /// identical to a sequential evaluation of the same candidates.
    pub fn evaluate_generation_parallel(
        &mut self,
        sampler: &mut Sampler,
        state: &SearchState,
        parameters: &Parameters,
        count: usize,
    ) -> Result<Vec<EvaluatedPoint>, GenerationError> {
        let resample_cap = RESAMPLE_CAP_FACTOR * parameters.lambda();
        let mut points = Vec::with_capacity(count);
        let mut failures = 0;

        let mut pending = sampler.sample(state, parameters, count)?;

        while !pending.is_empty() {
            let evaluator = &*self;
            let evaluate_batch = move || {
                pending
                    .into_par_iter()
                    .map(|candidate| {
                        let result = evaluator.evaluate_parallel(&candidate.point);
                        (candidate, result)
                    })
                    .collect::<Vec<_>>()
            };

            let evaluated = match &self.thread_pool {
                Some(pool) => pool.install(evaluate_batch),
                None => evaluate_batch(),
            };

            let mut discarded = 0;

            for (candidate, result) in evaluated {
                match result {
                    Ok(value) => points.push(EvaluatedPoint::new(candidate, value)),
                    Err(error) => {
                        self.handle_failure(error, &mut failures, resample_cap)?;
                        discarded += 1;
                    }
                }
            }

            pending = self.resample(sampler, state, parameters, discarded)?;
        }

        Ok(rank(points, self.mode))
    }
}

impl<F> Debug for Evaluator<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("budget", &self.budget)
            .field("mode", &self.mode)
            .field("failure_policy", &self.failure_policy)
            .field("invalid_fitness_policy", &self.invalid_fitness_policy)
            .finish()
    }
}

/// Ranks a generation from best to worst, breaking ties by sampling order.
fn rank(mut points: Vec<EvaluatedPoint>, mode: Mode) -> Vec<EvaluatedPoint> {
    // sort_by is stable, so tied points keep their sampling order
    points.sort_by(|a, b| mode.sort_cmp(a.value, b.value));
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    use crate::objective_function::Fallible;
    use crate::options::OptimizerOptions;
    use crate::strategy::Strategy;

    fn sphere(x: &DVector<f64>) -> f64 {
        x.iter().map(|xi| xi.powi(2)).sum()
    }

    fn fixture(
        dim: usize,
        lambda: usize,
    ) -> (Parameters, SearchState, Sampler) {
        let options = OptimizerOptions::new(dim).population_size(lambda);
        let parameters = Parameters::from_options(&options, 11);
        let state = SearchState::new(DVector::from_element(dim, 1.0), 0.5);
        let sampler = Sampler::new(dim, 11);
        (parameters, state, sampler)
    }

    fn evaluator<F>(objective_function: F, max: Option<usize>) -> Evaluator<F> {
        Evaluator::new(
            objective_function,
            EvaluationBudget::new(max),
            Mode::Minimize,
            FailurePolicy::default(),
            InvalidFitnessPolicy::default(),
            None,
        )
    }

    #[test]
    fn test_budget() {
        let budget = EvaluationBudget::new(Some(2));
        assert_eq!(0, budget.consumed());
        assert_eq!(Some(2), budget.remaining());
        assert!(!budget.is_exhausted());

        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(2, budget.consumed());
        assert_eq!(Some(0), budget.remaining());
        assert!(budget.is_exhausted());

        let restored = EvaluationBudget::restore(150, Some(200));
        assert_eq!(150, restored.consumed());
        assert_eq!(Some(50), restored.remaining());

        let unlimited = EvaluationBudget::new(None);
        for _ in 0..100 {
            assert!(unlimited.try_consume());
        }
        assert_eq!(100, unlimited.consumed());
        assert_eq!(None, unlimited.remaining());
        assert!(!unlimited.is_exhausted());
    }

    #[test]
    fn test_evaluate() {
        let mut evaluator = evaluator(sphere, Some(10));

        let value = evaluator
            .evaluate(&DVector::from_column_slice(&[3.0, 4.0]))
            .unwrap();

        assert_eq!(25.0, value);
        assert_eq!(1, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_budget_exceeded() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut evaluator = evaluator(
            move |x: &DVector<f64>| {
                counter.set(counter.get() + 1);
                sphere(x)
            },
            Some(1),
        );
        let point = DVector::zeros(2);

        assert!(evaluator.evaluate(&point).is_ok());
        assert_eq!(
            Err(EvaluationError::BudgetExceeded),
            evaluator.evaluate(&point),
        );
        // The objective function must not run once the budget is exhausted
        assert_eq!(1, calls.get());
        assert_eq!(1, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_objective_failure() {
        let mut evaluator = evaluator(
            Fallible(|_: &DVector<f64>| Err(ObjectiveError::new("broken"))),
            None,
        );

        assert_eq!(
            Err(EvaluationError::ObjectiveFailure(ObjectiveError::new(
                "broken"
            ))),
            evaluator.evaluate(&DVector::zeros(2)),
        );
        // The failed call still consumed its evaluation
        assert_eq!(1, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_panic() {
        let mut evaluator = evaluator(|_: &DVector<f64>| -> f64 { panic!("boom") }, None);

        match evaluator.evaluate(&DVector::zeros(2)) {
            Err(EvaluationError::ObjectiveFailure(error)) => {
                assert!(error.message().contains("panicked"));
                assert!(error.message().contains("boom"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(1, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_invalid_fitness() {
        let mut rejecting = evaluator(|_: &DVector<f64>| f64::NAN, None);
        assert!(matches!(
            rejecting.evaluate(&DVector::zeros(2)),
            Err(EvaluationError::InvalidFitness(_)),
        ));

        let mut worst = Evaluator::new(
            |_: &DVector<f64>| f64::NAN,
            EvaluationBudget::new(None),
            Mode::Minimize,
            FailurePolicy::default(),
            InvalidFitnessPolicy::TreatAsWorst,
            None,
        );
        assert_eq!(Ok(f64::INFINITY), worst.evaluate(&DVector::zeros(2)));

        let mut worst_max = Evaluator::new(
            |_: &DVector<f64>| f64::NAN,
            EvaluationBudget::new(None),
            Mode::Maximize,
            FailurePolicy::default(),
            InvalidFitnessPolicy::TreatAsWorst,
            None,
        );
        assert_eq!(Ok(f64::NEG_INFINITY), worst_max.evaluate(&DVector::zeros(2)));
    }

    #[test]
    fn test_evaluate_generation() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let mut evaluator = evaluator(sphere, Some(100));

        let points = evaluator
            .evaluate_generation(&mut sampler, &state, &parameters, 8)
            .unwrap();

        assert_eq!(8, points.len());
        assert_eq!(8, evaluator.budget().consumed());
        for pair in points.windows(2) {
            assert!(pair[0].value() <= pair[1].value());
        }
        for point in &points {
            assert_eq!(sphere(point.point()), point.value());
        }
    }

    #[test]
    fn test_evaluate_generation_fail_fast() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let mut evaluator = evaluator(
            Fallible(|_: &DVector<f64>| -> Result<f64, ObjectiveError> {
                Err(ObjectiveError::new("broken"))
            }),
            None,
        );

        let result = evaluator.evaluate_generation(&mut sampler, &state, &parameters, 8);

        assert!(matches!(
            result,
            Err(GenerationError::Evaluation(
                EvaluationError::ObjectiveFailure(_)
            )),
        ));
        // The first failure aborts the generation
        assert_eq!(1, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_generation_skip_and_resample() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut evaluator = Evaluator::new(
            Fallible(move |x: &DVector<f64>| {
                counter.set(counter.get() + 1);
                if counter.get() <= 2 {
                    Err(ObjectiveError::new("transient"))
                } else {
                    Ok(sphere(x))
                }
            }),
            EvaluationBudget::new(None),
            Mode::Minimize,
            FailurePolicy::SkipAndResample,
            InvalidFitnessPolicy::default(),
            None,
        );

        let points = evaluator
            .evaluate_generation(&mut sampler, &state, &parameters, 8)
            .unwrap();

        assert_eq!(8, points.len());
        assert_eq!(10, calls.get());
        assert_eq!(10, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_generation_resample_cap() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let mut evaluator = Evaluator::new(
            Fallible(|_: &DVector<f64>| -> Result<f64, ObjectiveError> {
                Err(ObjectiveError::new("broken"))
            }),
            EvaluationBudget::new(None),
            Mode::Minimize,
            FailurePolicy::SkipAndResample,
            InvalidFitnessPolicy::default(),
            None,
        );

        let result = evaluator.evaluate_generation(&mut sampler, &state, &parameters, 8);

        assert!(matches!(result, Err(GenerationError::Evaluation(_))));
        // Ten times the population size, plus the failure that hit the cap
        assert_eq!(81, evaluator.budget().consumed());
    }

    #[test]
    fn test_evaluate_generation_invalid_fitness_is_fatal_when_rejected() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        // Resampling only applies to objective failures, not invalid values
        let mut evaluator = Evaluator::new(
            move |x: &DVector<f64>| {
                counter.set(counter.get() + 1);
                if counter.get() == 3 {
                    f64::NAN
                } else {
                    sphere(x)
                }
            },
            EvaluationBudget::new(None),
            Mode::Minimize,
            FailurePolicy::SkipAndResample,
            InvalidFitnessPolicy::Reject,
            None,
        );

        let result = evaluator.evaluate_generation(&mut sampler, &state, &parameters, 8);

        assert!(matches!(
            result,
            Err(GenerationError::Evaluation(
                EvaluationError::InvalidFitness(_)
            )),
        ));
    }

    #[test]
    fn test_evaluate_generation_treat_as_worst_ranks_last() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut evaluator = Evaluator::new(
            move |x: &DVector<f64>| {
                counter.set(counter.get() + 1);
                if counter.get() == 3 {
                    f64::NAN
                } else {
                    sphere(x)
                }
            },
            EvaluationBudget::new(None),
            Mode::Minimize,
            FailurePolicy::default(),
            InvalidFitnessPolicy::TreatAsWorst,
            None,
        );

        let points = evaluator
            .evaluate_generation(&mut sampler, &state, &parameters, 8)
            .unwrap();

        assert_eq!(8, points.len());
        assert_eq!(f64::INFINITY, points[7].value());
        assert!(points[..7].iter().all(|point| point.value().is_finite()));
    }

    #[test]
    fn test_evaluate_generation_budget_clamps_resampling() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut evaluator = Evaluator::new(
            Fallible(move |x: &DVector<f64>| {
                counter.set(counter.get() + 1);
                if counter.get() <= 2 {
                    Err(ObjectiveError::new("transient"))
                } else {
                    Ok(sphere(x))
                }
            }),
            EvaluationBudget::new(Some(9)),
            Mode::Minimize,
            FailurePolicy::SkipAndResample,
            InvalidFitnessPolicy::default(),
            None,
        );

        let points = evaluator
            .evaluate_generation(&mut sampler, &state, &parameters, 8)
            .unwrap();

        // Only one of the two replacements fit into the budget
        assert_eq!(7, points.len());
        assert_eq!(9, evaluator.budget().consumed());
        assert!(evaluator.budget().is_exhausted());
    }

    #[test]
    fn test_evaluate_generation_parallel_matches_sequential() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let mut sequential = evaluator(sphere, Some(100));
        let sequential_points = sequential
            .evaluate_generation(&mut sampler, &state, &parameters, 8)
            .unwrap();

        let (parameters, state, mut sampler) = fixture(4, 8);
        let mut parallel = evaluator(sphere, Some(100));
        let parallel_points = parallel
            .evaluate_generation_parallel(&mut sampler, &state, &parameters, 8)
            .unwrap();

        assert_eq!(sequential_points, parallel_points);
        assert_eq!(8, parallel.budget().consumed());
    }

    #[test]
    fn test_evaluate_generation_parallel_with_pool() {
        let (parameters, state, mut sampler) = fixture(4, 8);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let mut evaluator = Evaluator::new(
            sphere,
            EvaluationBudget::new(Some(100)),
            Mode::Minimize,
            FailurePolicy::default(),
            InvalidFitnessPolicy::default(),
            Some(pool),
        );

        let points = evaluator
            .evaluate_generation_parallel(&mut sampler, &state, &parameters, 8)
            .unwrap();

        assert_eq!(8, points.len());
        assert_eq!(8, evaluator.budget().consumed());
    }
}
