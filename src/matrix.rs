//! Types related to matrix math.

use nalgebra::base::VecStorage;
use nalgebra::linalg::SymmetricEigen;
use nalgebra::{DVector, Dynamic};
use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;

pub type SquareMatrix<T> = nalgebra::SquareMatrix<T, Dynamic, VecStorage<T, Dynamic, Dynamic>>;

/// Eigenvalues below `-EIGEN_REPAIR_TOL` times the largest eigenvalue make
/// the matrix degenerate; anything between that and zero is rounding drift
/// and is clamped up to the same threshold.
const EIGEN_REPAIR_TOL: f64 = 1e-12;
/// Iteration cap for the symmetric eigensolver.
const EIGEN_MAX_ITERATIONS: usize = 200;

/// A symmetric square matrix that stores and updates its eigendecomposition and inverse square root
/// (`C^(-1/2)`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    /// Covariance matrix
    cov: SquareMatrix<f64>,
    /// Normalized eigenvectors, forming an orthonormal basis of the matrix
    eigenvectors: SquareMatrix<f64>,
    /// Diagonal matrix containing the square roots of the eigenvalues, which are the
    /// scales of the basis axes
    sqrt_eigenvalues: SquareMatrix<f64>,
    /// The inverse square root of the matrix (`C^(-1/2)`)
    sqrt_inv: SquareMatrix<f64>,
}

impl CovarianceMatrix {
    /// Returns an identity `CovarianceMatrix`
    pub fn new(dim: usize) -> Self {
        Self {
            cov: SquareMatrix::identity(dim, dim),
            eigenvectors: SquareMatrix::identity(dim, dim),
            sqrt_eigenvalues: SquareMatrix::identity(dim, dim),
            sqrt_inv: SquareMatrix::identity(dim, dim),
        }
    }

    pub fn cov(&self) -> &SquareMatrix<f64> {
        &self.cov
    }

    /// Updates the covariance matrix, symmetrizes it, and updates the eigendecomposition if
    /// `update_eigen` is true
    ///
    /// Returns `Err` if the matrix cannot be decomposed into a valid sampling
    /// transform
    pub fn set_cov(
        &mut self,
        new: SquareMatrix<f64>,
        update_eigen: bool,
    ) -> Result<(), DegenerateCovarianceError> {
        self.cov = new;
        // Ensure symmetry
        self.cov.fill_lower_triangle_with_upper_triangle();

        if update_eigen {
            self.update_eigendecomposition()?;
        }

        Ok(())
    }

    /// Updates the eigendecomposition
    ///
    /// Eigenvalues within rounding drift of zero are clamped to a small
    /// positive floor; returns `Err` if the matrix is non-finite or not
    /// positive-definite beyond that drift.
    pub(crate) fn update_eigendecomposition(&mut self) -> Result<(), DegenerateCovarianceError> {
        if self.cov.iter().any(|x| !x.is_finite()) {
            return Err(DegenerateCovarianceError);
        }

        let mut eigen =
            SymmetricEigen::try_new(self.cov.clone(), f64::EPSILON, EIGEN_MAX_ITERATIONS)
                .ok_or(DegenerateCovarianceError)?;

        for mut col in eigen.eigenvectors.column_iter_mut() {
            col.normalize_mut();
        }

        let max_eigenvalue = eigen.eigenvalues.max();

        if !(max_eigenvalue.is_finite() && max_eigenvalue > 0.0) {
            return Err(DegenerateCovarianceError);
        }

        let floor = max_eigenvalue * EIGEN_REPAIR_TOL;

        for value in eigen.eigenvalues.iter_mut() {
            if *value <= 0.0 {
                if *value < -floor {
                    return Err(DegenerateCovarianceError);
                }

                *value = floor;
            }
        }

        self.eigenvectors = eigen.eigenvectors;
        self.sqrt_eigenvalues = SquareMatrix::from_diagonal(&eigen.eigenvalues.map(f64::sqrt));
        self.sqrt_inv = &self.eigenvectors
            * self.sqrt_eigenvalues.map(|d| if d > 0.0 { 1.0 / d } else { d })
            * self.eigenvectors.transpose();

        Ok(())
    }

    /// Applies the transform `B * D` to `z`, mapping a standard normal draw
    /// into the distribution described by the matrix
    pub fn transform(&self, z: &DVector<f64>) -> DVector<f64> {
        &self.eigenvectors * self.sqrt_eigenvalues.diagonal().component_mul(z)
    }

    /// Returns whether the stored decomposition is usable as a sampling
    /// transform
    pub(crate) fn transform_valid(&self) -> bool {
        self.sqrt_eigenvalues
            .diagonal()
            .iter()
            .all(|d| d.is_finite() && *d > 0.0)
            && self.eigenvectors.iter().all(|x| x.is_finite())
    }

    /// Returns the ratio of the largest to smallest axis scale of the
    /// distribution, based on the stored decomposition
    pub fn axis_ratio(&self) -> f64 {
        let diagonal = self.sqrt_eigenvalues.diagonal();
        diagonal.max() / diagonal.min()
    }

    pub fn eigenvectors(&self) -> &SquareMatrix<f64> {
        &self.eigenvectors
    }

    pub fn sqrt_eigenvalues(&self) -> &SquareMatrix<f64> {
        &self.sqrt_eigenvalues
    }

    pub fn sqrt_inv(&self) -> &SquareMatrix<f64> {
        &self.sqrt_inv
    }

    // Only used for setting up degenerate-transform tests
    #[cfg(test)]
    pub(crate) fn mut_sqrt_eigenvalues(&mut self) -> &mut SquareMatrix<f64> {
        &mut self.sqrt_eigenvalues
    }
}

/// The covariance matrix cannot be decomposed into a valid sampling
/// transform (it is non-finite or not positive-definite).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DegenerateCovarianceError;

impl fmt::Display for DegenerateCovarianceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "the covariance matrix is degenerate and cannot be decomposed"
        )
    }
}

impl Error for DegenerateCovarianceError {}
