//! Handling of different optimization modes (minimize and maximize)

use serde::{Deserialize, Serialize};

use std::cmp::Ordering;

use crate::utils;

/// The mode to use when optimizing a function.
///
/// The default value is `Minimize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Minimize the value of the function.
    Minimize,
    /// Maximize the value of the function.
    Maximize,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Minimize
    }
}

impl Mode {
    /// Compares the two values
    /// For use in sorting
    pub(crate) fn sort_cmp(&self, a: f64, b: f64) -> Ordering {
        match self {
            Mode::Minimize => utils::partial_cmp(a, b),
            Mode::Maximize => utils::partial_cmp(b, a),
        }
    }

    /// Returns whether `a` is a better function value than `b`
    pub(crate) fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            Mode::Minimize => a < b,
            Mode::Maximize => a > b,
        }
    }

    /// Returns whether `value` meets the configured fitness target
    pub(crate) fn reached_target(&self, value: f64, target: f64) -> bool {
        match self {
            Mode::Minimize => value <= target,
            Mode::Maximize => value >= target,
        }
    }

    pub(crate) fn choose_best(&self, a: f64, b: f64) -> f64 {
        match self {
            Mode::Minimize => a.min(b),
            Mode::Maximize => a.max(b),
        }
    }

    /// Returns the value that ranks after every real function value
    pub(crate) fn worst(&self) -> f64 {
        match self {
            Mode::Minimize => f64::INFINITY,
            Mode::Maximize => f64::NEG_INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_cmp() {
        assert_eq!(Ordering::Less, Mode::Minimize.sort_cmp(1.0, 2.0));
        assert_eq!(Ordering::Equal, Mode::Minimize.sort_cmp(1.0, 1.0));
        assert_eq!(Ordering::Greater, Mode::Minimize.sort_cmp(2.0, 1.0));

        assert_eq!(Ordering::Greater, Mode::Maximize.sort_cmp(1.0, 2.0));
        assert_eq!(Ordering::Equal, Mode::Maximize.sort_cmp(1.0, 1.0));
        assert_eq!(Ordering::Less, Mode::Maximize.sort_cmp(2.0, 1.0));
    }

    #[test]
    fn test_is_better() {
        assert!(Mode::Minimize.is_better(1.0, 2.0));
        assert!(!Mode::Minimize.is_better(2.0, 2.0));
        assert!(!Mode::Minimize.is_better(2.0, 1.0));

        assert!(!Mode::Maximize.is_better(1.0, 2.0));
        assert!(!Mode::Maximize.is_better(2.0, 2.0));
        assert!(Mode::Maximize.is_better(2.0, 1.0));
    }

    #[test]
    fn test_reached_target() {
        assert!(Mode::Minimize.reached_target(0.5, 1.0));
        assert!(Mode::Minimize.reached_target(1.0, 1.0));
        assert!(!Mode::Minimize.reached_target(2.0, 1.0));

        assert!(Mode::Maximize.reached_target(2.0, 1.0));
        assert!(Mode::Maximize.reached_target(1.0, 1.0));
        assert!(!Mode::Maximize.reached_target(0.5, 1.0));
    }

    #[test]
    fn test_choose_best() {
        assert_eq!(1.0, Mode::Minimize.choose_best(1.0, 2.0));
        assert_eq!(1.0, Mode::Minimize.choose_best(2.0, 1.0));

        assert_eq!(2.0, Mode::Maximize.choose_best(1.0, 2.0));
        assert_eq!(2.0, Mode::Maximize.choose_best(2.0, 1.0));
    }

    #[test]
    fn test_worst() {
        assert!(Mode::Minimize.is_better(1e300, Mode::Minimize.worst()));
        assert!(Mode::Maximize.is_better(-1e300, Mode::Maximize.worst()));
    }
}
