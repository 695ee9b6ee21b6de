//! Saving the full state of a run and resuming it later. See [`Checkpoint`]
//! for full documentation.

use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;
use std::io::{Read, Write};

use crate::history::History;
use crate::mode::Mode;
use crate::options::{InvalidOptionsError, OptimizerOptions};
use crate::state::SearchState;
use crate::strategy::Strategy;

/// A snapshot of a run that can be serialized and resumed later.
///
/// Obtained from [`Optimizer::checkpoint`][crate::Optimizer::checkpoint] and
/// turned back into an optimizer with
/// [`OptimizerOptions::resume`][crate::OptimizerOptions::resume]. The
/// snapshot carries the search distribution, the function value history, the
/// number of evaluations consumed, and the random number generator
/// mid-sequence, so a resumed run continues the trajectory of the original.
///
/// # Examples
///
/// ```no_run
/// use nalgebra::DVector;
/// use popbox::{Checkpoint, OptimizerOptions};
/// use std::fs::File;
///
/// let sphere = |x: &DVector<f64>| x.iter().map(|xi| xi.powi(2)).sum();
/// let mut optimizer = OptimizerOptions::new(4)
///     .seed(12)
///     .max_evaluations(5_000)
///     .build(sphere)
///     .unwrap();
/// optimizer.run();
///
/// optimizer
///     .checkpoint()
///     .write_to(File::create("run.json").unwrap())
///     .unwrap();
///
/// let checkpoint = Checkpoint::read_from(File::open("run.json").unwrap()).unwrap();
/// let mut resumed = OptimizerOptions::new(4)
///     .seed(12)
///     .max_evaluations(10_000)
///     .resume(sphere, checkpoint)
///     .unwrap();
/// resumed.run();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The problem shape the run was started with, checked when resuming
    pub(crate) dimensions: usize,
    pub(crate) population_size: usize,
    pub(crate) strategy: Strategy,
    pub(crate) mode: Mode,
    /// The seed the run was started with, kept for reporting
    pub(crate) seed: u64,
    /// The variable state of the run
    pub(crate) state: SearchState,
    /// The function value history of the run
    pub(crate) history: History,
    /// The number of objective function evaluations consumed so far
    pub(crate) function_evals: usize,
    /// The random number generator, mid-sequence
    pub(crate) rng: ChaCha12Rng,
}

impl Checkpoint {
    /// Writes the checkpoint to `writer` as JSON.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), CheckpointError> {
        serde_json::to_writer(writer, self).map_err(CheckpointError::Write)
    }

    /// Reads a checkpoint previously written with [`Checkpoint::write_to`]
    /// from `reader`.
    pub fn read_from<R: Read>(reader: R) -> Result<Self, CheckpointError> {
        serde_json::from_reader(reader).map_err(CheckpointError::Read)
    }

    /// Checks that `options` describe the same problem shape this checkpoint
    /// was taken from.
    pub(crate) fn validate_shape(&self, options: &OptimizerOptions) -> Result<(), ResumeError> {
        if options.dimensions != self.dimensions {
            return Err(ResumeError::DimensionsMismatch);
        }

        if options.population_size != self.population_size {
            return Err(ResumeError::PopulationSizeMismatch);
        }

        if options.strategy != self.strategy {
            return Err(ResumeError::StrategyMismatch);
        }

        if options.mode != self.mode {
            return Err(ResumeError::ModeMismatch);
        }

        Ok(())
    }
}

/// An error produced while writing or reading a [`Checkpoint`].
#[derive(Debug)]
pub enum CheckpointError {
    /// The checkpoint could not be serialized or written.
    Write(serde_json::Error),
    /// The checkpoint could not be read or parsed.
    Read(serde_json::Error),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CheckpointError::Write(error) => {
                write!(f, "the checkpoint could not be written: {}", error)
            }
            CheckpointError::Read(error) => {
                write!(f, "the checkpoint could not be read: {}", error)
            }
        }
    }
}

impl Error for CheckpointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CheckpointError::Write(error) | CheckpointError::Read(error) => Some(error),
        }
    }
}

/// An error produced when resuming a run from a [`Checkpoint`] fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeError {
    /// The options are invalid on their own.
    InvalidOptions(InvalidOptionsError),
    /// The number of dimensions differs between the options and the
    /// checkpoint.
    DimensionsMismatch,
    /// The population size differs between the options and the checkpoint.
    PopulationSizeMismatch,
    /// The update strategy differs between the options and the checkpoint.
    StrategyMismatch,
    /// The optimization mode differs between the options and the checkpoint.
    ModeMismatch,
}

impl fmt::Display for ResumeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResumeError::InvalidOptions(error) => write!(f, "{}", error),
            ResumeError::DimensionsMismatch => {
                write!(f, "the options and checkpoint disagree on the number of dimensions")
            }
            ResumeError::PopulationSizeMismatch => {
                write!(f, "the options and checkpoint disagree on the population size")
            }
            ResumeError::StrategyMismatch => {
                write!(f, "the options and checkpoint disagree on the update strategy")
            }
            ResumeError::ModeMismatch => {
                write!(f, "the options and checkpoint disagree on the optimization mode")
            }
        }
    }
}

impl Error for ResumeError {}

impl From<InvalidOptionsError> for ResumeError {
    fn from(error: InvalidOptionsError) -> Self {
        ResumeError::InvalidOptions(error)
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;
    use rand::SeedableRng;

    use super::*;

    fn get_checkpoint() -> Checkpoint {
        let mut history = History::new(Mode::Minimize);
        history.mut_best_function_values().extend([3.0, 2.0, 1.0]);

        Checkpoint {
            dimensions: 4,
            population_size: 8,
            strategy: Strategy::Cma,
            mode: Mode::Minimize,
            seed: 96,
            state: SearchState::new(DVector::from_element(4, 1.5), 0.25),
            history,
            function_evals: 42,
            rng: ChaCha12Rng::seed_from_u64(96),
        }
    }

    #[test]
    fn test_round_trip() {
        let checkpoint = get_checkpoint();

        let mut buffer = Vec::new();
        checkpoint.write_to(&mut buffer).unwrap();
        let restored = Checkpoint::read_from(buffer.as_slice()).unwrap();

        assert_eq!(checkpoint.dimensions, restored.dimensions);
        assert_eq!(checkpoint.population_size, restored.population_size);
        assert_eq!(checkpoint.strategy, restored.strategy);
        assert_eq!(checkpoint.mode, restored.mode);
        assert_eq!(checkpoint.seed, restored.seed);
        assert_eq!(checkpoint.state, restored.state);
        assert_eq!(checkpoint.history, restored.history);
        assert_eq!(checkpoint.function_evals, restored.function_evals);
        assert_eq!(checkpoint.rng, restored.rng);
    }

    #[test]
    fn test_read_rejects_invalid_data() {
        assert!(Checkpoint::read_from(&b"not a checkpoint"[..]).is_err());
    }

    #[test]
    fn test_validate_shape() {
        let checkpoint = get_checkpoint();

        let matching = crate::OptimizerOptions::new(4).population_size(8);
        assert!(checkpoint.validate_shape(&matching).is_ok());

        assert_eq!(
            Err(ResumeError::DimensionsMismatch),
            checkpoint.validate_shape(&crate::OptimizerOptions::new(5).population_size(8)),
        );
        assert_eq!(
            Err(ResumeError::PopulationSizeMismatch),
            checkpoint.validate_shape(&crate::OptimizerOptions::new(4).population_size(10)),
        );
        assert_eq!(
            Err(ResumeError::StrategyMismatch),
            checkpoint.validate_shape(
                &crate::OptimizerOptions::new(4)
                    .population_size(8)
                    .strategy(Strategy::SelfAdaptiveSigma),
            ),
        );
        assert_eq!(
            Err(ResumeError::ModeMismatch),
            checkpoint.validate_shape(
                &crate::OptimizerOptions::new(4)
                    .population_size(8)
                    .mode(Mode::Maximize),
            ),
        );
    }
}
