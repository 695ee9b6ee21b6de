//! Objective function value history tracking.

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;

use crate::evaluation::EvaluatedPoint;
use crate::mode::Mode;
use crate::Individual;

/// The maximum number of generations of best function values to retain.
pub(crate) const MAX_HISTORY_LENGTH: usize = 20_000;

/// Tracks the best objective function values of past generations, the current
/// and overall best individuals, and how long ago the overall best improved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct History {
    /// The optimization mode, which decides what counts as an improvement
    mode: Mode,
    /// Best function values per generation (values at the front are from more
    /// recent generations)
    best_function_values: VecDeque<f64>,
    /// The best individual of the latest generation
    current_best_individual: Option<Individual>,
    /// The best individual of any generation
    overall_best_individual: Option<Individual>,
    /// The number of generations since the overall best individual improved
    generations_since_improvement: usize,
}

impl History {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            best_function_values: VecDeque::new(),
            current_best_individual: None,
            overall_best_individual: None,
            generations_since_improvement: 0,
        }
    }

    pub fn best_function_values(&self) -> &VecDeque<f64> {
        &self.best_function_values
    }

    /// Always `Some` if `Self::update` has been called at least once
    pub fn current_best_individual(&self) -> Option<&Individual> {
        self.current_best_individual.as_ref()
    }

    /// Always `Some` if `Self::update` has been called at least once
    pub fn overall_best_individual(&self) -> Option<&Individual> {
        self.overall_best_individual.as_ref()
    }

    pub fn generations_since_improvement(&self) -> usize {
        self.generations_since_improvement
    }

    /// Updates the histories based on the current generation of individuals.
    /// Assumes that `current_generation` is non-empty and already ranked from
    /// best to worst.
    pub fn update(&mut self, current_generation: &[EvaluatedPoint]) {
        let best = &current_generation[0];

        self.best_function_values.push_front(best.value());
        if self.best_function_values.len() > MAX_HISTORY_LENGTH {
            self.best_function_values.pop_back();
        }

        self.update_best_individuals(Individual::new(best.point().clone(), best.value()));
    }

    /// Updates the current and overall best individuals and the improvement
    /// counter
    fn update_best_individuals(&mut self, current_best: Individual) {
        match &mut self.overall_best_individual {
            Some(overall) => {
                if self.mode.is_better(current_best.value, overall.value) {
                    *overall = current_best.clone();
                    self.generations_since_improvement = 0;
                } else {
                    self.generations_since_improvement += 1;
                }
            }
            None => {
                self.overall_best_individual = Some(current_best.clone());
                self.generations_since_improvement = 0;
            }
        }

        self.current_best_individual = Some(current_best);
    }

    #[cfg(test)]
    pub(crate) fn mut_best_function_values(&mut self) -> &mut VecDeque<f64> {
        &mut self.best_function_values
    }

    #[cfg(test)]
    pub(crate) fn mut_generations_since_improvement(&mut self) -> &mut usize {
        &mut self.generations_since_improvement
    }
}
