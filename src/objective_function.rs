//! Traits for types that can be used as an objective function, and wrappers
//! that adjust how an objective function is called.

use nalgebra::DVector;

use std::error::Error;
use std::fmt;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// An error produced by one objective function evaluation.
///
/// Returned directly by fallible objective functions and produced by the
/// engine when an evaluation panics or runs past a [`Timeout`] limit. The
/// message is carried into the diagnostic of the final report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectiveError {
    message: String,
}

impl ObjectiveError {
    /// Returns a new `ObjectiveError` with the provided message.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message describing the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObjectiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "objective function failed: {}", self.message)
    }
}

impl Error for ObjectiveError {}

/// A trait for types that can be used as an objective function.
///
/// `evaluate` returns the fitness of a point, or an [`ObjectiveError`] if no
/// value could be produced for it. The trait is implemented for all
/// `FnMut(&DVector<f64>) -> f64`, so plain functions and closures can be used
/// directly (they never fail):
///
/// ```
/// use nalgebra::DVector;
/// use popbox::{ObjectiveFunction, OptimizerOptions};
///
/// fn sphere(x: &DVector<f64>) -> f64 {
///     x.iter().map(|xi| xi.powi(2)).sum()
/// }
///
/// let optimizer = OptimizerOptions::new(4).build(sphere).unwrap();
///
/// // Closures can capture and mutate state
/// let mut count = 0;
/// let counting = |x: &DVector<f64>| {
///     count += 1;
///     x.magnitude()
/// };
/// let optimizer = OptimizerOptions::new(4).build(counting).unwrap();
/// ```
///
/// Use [`Fallible`] for a closure that returns a `Result` itself, and
/// [`ParallelObjectiveFunction`] for functions that may be evaluated from
/// multiple threads.
pub trait ObjectiveFunction {
    fn evaluate(&mut self, x: &DVector<f64>) -> Result<f64, ObjectiveError>;
}

impl<F: FnMut(&DVector<f64>) -> f64> ObjectiveFunction for F {
    fn evaluate(&mut self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        Ok((self)(x))
    }
}

impl<'a> ObjectiveFunction for Box<dyn ObjectiveFunction + 'a> {
    fn evaluate(&mut self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        (**self).evaluate(x)
    }
}

/// Like [`ObjectiveFunction`], but for types that can be evaluated in
/// parallel from multiple threads at once.
///
/// Implemented for all `Fn(&DVector<f64>) -> f64` that are `Sync`. Required
/// by [`Optimizer::run_parallel`][crate::Optimizer::run_parallel] and
/// related methods.
pub trait ParallelObjectiveFunction: Sync {
    fn evaluate_parallel(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError>;
}

impl<F: Sync + Fn(&DVector<f64>) -> f64> ParallelObjectiveFunction for F {
    fn evaluate_parallel(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        Ok((self)(x))
    }
}

impl<'a> ParallelObjectiveFunction for Box<dyn ParallelObjectiveFunction + 'a> {
    fn evaluate_parallel(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        (**self).evaluate_parallel(x)
    }
}

/// Lifts a closure that returns `Result<f64, ObjectiveError>` into the
/// objective function traits.
///
/// ```
/// use nalgebra::DVector;
/// use popbox::{Fallible, ObjectiveError, OptimizerOptions};
///
/// let guarded = Fallible(|x: &DVector<f64>| {
///     if x.iter().all(|xi| xi.abs() < 1e3) {
///         Ok(x.magnitude())
///     } else {
///         Err(ObjectiveError::new("simulation diverged"))
///     }
/// });
/// let optimizer = OptimizerOptions::new(4).build(guarded).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Fallible<F>(pub F);

impl<F: FnMut(&DVector<f64>) -> Result<f64, ObjectiveError>> ObjectiveFunction for Fallible<F> {
    fn evaluate(&mut self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        (self.0)(x)
    }
}

impl<F: Sync + Fn(&DVector<f64>) -> Result<f64, ObjectiveError>> ParallelObjectiveFunction
    for Fallible<F>
{
    fn evaluate_parallel(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        (self.0)(x)
    }
}

/// A wrapper that scales the coordinates of each point before passing it to
/// the wrapped function.
///
/// Useful for problems whose search ranges differ per dimension: optimize in
/// a normalized space and let `Scale` map points into the problem's space.
#[derive(Clone, Debug)]
pub struct Scale<F> {
    function: F,
    scales: DVector<f64>,
}

impl<F> Scale<F> {
    /// Returns a new `Scale`, multiplying the `i`th coordinate of each point
    /// by `scales[i]` before evaluation.
    pub fn new(function: F, scales: DVector<f64>) -> Self {
        Self { function, scales }
    }
}

impl<F: ObjectiveFunction> ObjectiveFunction for Scale<F> {
    fn evaluate(&mut self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        self.function.evaluate(&x.component_mul(&self.scales))
    }
}

impl<F: ParallelObjectiveFunction> ParallelObjectiveFunction for Scale<F> {
    fn evaluate_parallel(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        self.function
            .evaluate_parallel(&x.component_mul(&self.scales))
    }
}

/// A wrapper that bounds the wall-clock time of each evaluation of the
/// wrapped function.
///
/// Every call is dispatched to a fresh watchdog thread. If no result arrives
/// within the limit, the evaluation fails with an [`ObjectiveError`] instead
/// of hanging the run. The abandoned call is detached and keeps its thread
/// until the underlying function returns, which is why the wrapped function
/// must be `Send + Sync + 'static`.
#[derive(Clone, Debug)]
pub struct Timeout<F> {
    function: Arc<F>,
    limit: Duration,
}

impl<F: ParallelObjectiveFunction + Send + Sync + 'static> Timeout<F> {
    /// Returns a new `Timeout` that fails any evaluation of `function`
    /// taking longer than `limit`.
    pub fn new(function: F, limit: Duration) -> Self {
        Self {
            function: Arc::new(function),
            limit,
        }
    }

    fn supervise(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        let (sender, receiver) = mpsc::channel();
        let function = Arc::clone(&self.function);
        let point = x.clone_owned();

        thread::spawn(move || {
            let _ = sender.send(function.evaluate_parallel(&point));
        });

        match receiver.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(_) => Err(ObjectiveError::new(format!(
                "evaluation did not finish within {:?}",
                self.limit
            ))),
        }
    }
}

impl<F: ParallelObjectiveFunction + Send + Sync + 'static> ObjectiveFunction for Timeout<F> {
    fn evaluate(&mut self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        self.supervise(x)
    }
}

impl<F: ParallelObjectiveFunction + Send + Sync + 'static> ParallelObjectiveFunction
    for Timeout<F>
{
    fn evaluate_parallel(&self, x: &DVector<f64>) -> Result<f64, ObjectiveError> {
        self.supervise(x)
    }
}
