//! Sampling of candidate points from the search distribution.

use nalgebra::DVector;
use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use statrs::distribution::Normal;

use std::error::Error;
use std::fmt;

use crate::parameters::Parameters;
use crate::state::SearchState;
use crate::strategy::StrategyParameters;

/// A type for drawing candidate points from the search distribution
///
/// All random numbers of a run are sourced from the sampler's RNG, so a seed
/// fully determines the sample sequence.
#[derive(Clone, Debug)]
pub(crate) struct Sampler {
    /// Number of dimensions to sample from
    dim: usize,
    /// RNG from which all random numbers are sourced
    rng: ChaCha12Rng,
}

impl Sampler {
    pub fn new(dim: usize, rng_seed: u64) -> Self {
        Self {
            dim,
            rng: ChaCha12Rng::seed_from_u64(rng_seed),
        }
    }

    /// Restores a sampler from a saved RNG, continuing its sample sequence
    pub fn from_rng(dim: usize, rng: ChaCha12Rng) -> Self {
        Self { dim, rng }
    }

    pub fn rng(&self) -> &ChaCha12Rng {
        &self.rng
    }

    /// Draws `count` candidates from the distribution described by `state`
    ///
    /// Returns `Err` if the distribution does not currently describe a valid
    /// sampling transform.
    pub fn sample(
        &mut self,
        state: &SearchState,
        parameters: &Parameters,
        count: usize,
    ) -> Result<Vec<Candidate>, DegenerateDistributionError> {
        if !state.cov.transform_valid() {
            return Err(DegenerateDistributionError);
        }

        let normal = Normal::new(0.0, 1.0).unwrap();

        // Per-candidate step size factors are drawn for the self-adaptive
        // strategy only
        let tau = match parameters.strategy_parameters() {
            StrategyParameters::SelfAdaptiveSigma(p) => Some(p.tau()),
            _ => None,
        };

        let candidates = (0..count)
            .map(|_| {
                // Random step in the distribution N(0, cov)
                let z = DVector::from_iterator(
                    self.dim,
                    (0..self.dim).map(|_| normal.sample(&mut self.rng)),
                );
                let y = state.cov.transform(&z);

                let sigma_factor = match tau {
                    Some(tau) => (tau * normal.sample(&mut self.rng)).exp(),
                    None => 1.0,
                };

                let step = sigma_factor * y;
                let point = &state.mean + state.sigma * &step;

                Candidate {
                    point,
                    step,
                    sigma_factor,
                }
            })
            .collect();

        Ok(candidates)
    }
}

/// A point drawn from the search distribution, before evaluation
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Candidate {
    /// The point to evaluate
    pub point: DVector<f64>,
    /// The step from the mean that produced the point, in the distribution
    /// N(0, cov) and scaled by `sigma_factor`
    pub step: DVector<f64>,
    /// Step size factor drawn for this candidate
    pub sigma_factor: f64,
}

/// The search distribution has collapsed and cannot produce valid candidates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DegenerateDistributionError;

impl fmt::Display for DegenerateDistributionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "the search distribution is degenerate and cannot be sampled"
        )
    }
}

impl Error for DegenerateDistributionError {}

#[cfg(test)]
mod tests {
    use crate::{OptimizerOptions, Strategy};

    use super::*;

    fn test_parameters(dim: usize, strategy: Strategy) -> Parameters {
        let options = OptimizerOptions::new(dim)
            .population_size(12)
            .strategy(strategy);
        Parameters::from_options(&options, 0)
    }

    #[test]
    fn test_sample() {
        let dim = 10;
        let parameters = test_parameters(dim, Strategy::Cma);
        let state = SearchState::new(DVector::zeros(dim), 2.0);
        let mut sampler = Sampler::new(dim, 1);

        for _ in 0..5 {
            let candidates = sampler.sample(&state, &parameters, 12).unwrap();

            assert_eq!(12, candidates.len());

            for candidate in &candidates {
                assert_eq!(dim, candidate.point.len());
                assert_eq!(dim, candidate.step.len());
                assert_eq!(1.0, candidate.sigma_factor);

                // With an identity covariance matrix the point is exactly
                // mean + sigma * step
                for (x, step) in candidate.point.iter().zip(candidate.step.iter()) {
                    assert_eq!(*x, 2.0 * step);
                }
            }
        }
    }

    // Tests that the same seed produces the same sample sequence and that
    // different seeds do not
    #[test]
    fn test_sample_deterministic() {
        let dim = 6;
        let parameters = test_parameters(dim, Strategy::Cma);
        let state = SearchState::new(DVector::zeros(dim), 1.0);

        let mut a = Sampler::new(dim, 7);
        let mut b = Sampler::new(dim, 7);
        let mut c = Sampler::new(dim, 8);

        let sample_a = a.sample(&state, &parameters, 12).unwrap();
        let sample_b = b.sample(&state, &parameters, 12).unwrap();
        let sample_c = c.sample(&state, &parameters, 12).unwrap();

        for (pa, pb) in sample_a.iter().zip(sample_b.iter()) {
            assert_eq!(pa.point, pb.point);
            assert_eq!(pa.step, pb.step);
        }

        assert!(sample_a
            .iter()
            .zip(sample_c.iter())
            .any(|(pa, pc)| pa.point != pc.point));
    }

    // Tests that the self-adaptive strategy attaches lognormal step size
    // factors
    #[test]
    fn test_sample_sigma_factors() {
        let dim = 6;
        let parameters = test_parameters(dim, Strategy::SelfAdaptiveSigma);
        let state = SearchState::new(DVector::zeros(dim), 1.0);
        let mut sampler = Sampler::new(dim, 1);

        let candidates = sampler.sample(&state, &parameters, 12).unwrap();

        assert!(candidates.iter().all(|c| c.sigma_factor > 0.0));
        assert!(candidates.iter().any(|c| c.sigma_factor != 1.0));
    }

    #[test]
    fn test_sample_degenerate() {
        let dim = 4;
        let parameters = test_parameters(dim, Strategy::Cma);
        let mut state = SearchState::new(DVector::zeros(dim), 1.0);
        let mut sampler = Sampler::new(dim, 1);

        // A collapsed axis makes the stored transform unusable
        state.cov.mut_sqrt_eigenvalues()[(0, 0)] = 0.0;

        assert_eq!(
            Err(DegenerateDistributionError),
            sampler.sample(&state, &parameters, 12),
        );
    }
}
