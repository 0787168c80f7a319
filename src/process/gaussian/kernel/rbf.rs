use super::{e2_norm, single_parameter, CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{dvector, DMatrix, DVector, Dim, Matrix};
use std::f64;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Radial-basis function (RBF) kernel
/// The distance metric here is L2 (Euclidean).
///
/// ```math
///     K(\mathbf{x}, \mathbf{x'}) = \exp\left(-\frac{\|\mathbf{x} - \mathbf{x'}\|^2}{2l^2}\right)
/// ```
///
/// # Parameters
/// * `lengthscale` - Length scale, `l`.
///
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct RBFKernel {
    lengthscale: f64,
}

impl RBFKernel {
    /// Create a new rbf kernel with the given length scale
    pub fn new(lengthscale: f64) -> Result<Self, KernelError> {
        if lengthscale > 0.0 && lengthscale.is_finite() {
            Ok(Self { lengthscale })
        } else {
            Err(KernelError::positive("lengthscale", lengthscale))
        }
    }

    /// Create a new `RBFKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(lengthscale: f64) -> Self {
        Self { lengthscale }
    }

    /// The length scale
    #[must_use]
    pub fn lengthscale(&self) -> f64 {
        self.lengthscale
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self { lengthscale: 1.0 }
    }
}

impl Kernel for RBFKernel {
    fn n_parameters(&self) -> usize {
        1
    }

    fn covariance<R1, R2, C1, C2, S1, S2>(
        &self,
        x1: &Matrix<f64, R1, C1, S1>,
        x2: &Matrix<f64, R2, C2, S2>,
    ) -> DMatrix<f64>
    where
        R1: Dim,
        R2: Dim,
        C1: Dim,
        C2: Dim,
        S1: Storage<f64, R1, C1>,
        S2: Storage<f64, R2, C2>,
        ShapeConstraint: SameNumberOfColumns<C1, C2>,
    {
        DMatrix::from_fn(x1.nrows(), x2.nrows(), |i, j| {
            let d2 = e2_norm(&x1.row(i), &x2.row(j), self.lengthscale);
            (-0.5 * d2).exp()
        })
    }

    fn is_stationary(&self) -> bool {
        true
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        DVector::repeat(x.nrows(), 1.0)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.lengthscale.ln()]
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        vec![("lengthscale", self.lengthscale)]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        single_parameter(params).and_then(|value| Self::new(value.exp()))
    }

    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let n = x.nrows();

        let mut dm = DMatrix::zeros(n, n);
        let mut grad = CovGrad::zeros(n, 1);

        for i in 0..n {
            for j in 0..i {
                let d2 = e2_norm(&x.row(i), &x.row(j), self.lengthscale);
                let cov_ij = (-d2 / 2.0).exp();

                dm[(i, j)] = cov_ij;
                dm[(j, i)] = cov_ij;

                // d/d(ln l) of exp(-d2 / 2), with d2 already scaled by l^2
                let dc_dl = d2 * cov_ij;
                grad[(i, j, 0)] = dc_dl;
                grad[(j, i, 0)] = dc_dl;
            }
            dm[(i, i)] = 1.0;
        }

        Ok((dm, grad))
    }
}
