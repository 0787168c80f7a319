use super::{single_parameter, CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{dvector, DMatrix, DVector, Dim, Matrix};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// White Noise Kernel
///
/// Only contributes on the diagonal of `k(x, x)`; the cross covariance
/// between two different sets of points is zero.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct WhiteKernel {
    /// Level of the noise
    noise_level: f64,
}

impl WhiteKernel {
    /// Create a new WhiteKernel with the given level of noise
    pub fn new(noise_level: f64) -> Result<Self, KernelError> {
        if noise_level > 0.0 && noise_level.is_finite() {
            Ok(Self { noise_level })
        } else {
            Err(KernelError::positive("noise_level", noise_level))
        }
    }

    /// Create a new WhiteKernel without check the parameters
    #[must_use]
    pub fn new_unchecked(noise_level: f64) -> Self {
        Self { noise_level }
    }

    #[must_use]
    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }
}

impl Kernel for WhiteKernel {
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
        DMatrix::zeros(x1.nrows(), x2.nrows())
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
        DVector::from_element(x.nrows(), self.noise_level)
    }

    fn gram<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let n = x.nrows();
        DMatrix::from_diagonal_element(n, n, self.noise_level)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.noise_level.ln()]
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        vec![("noise_level", self.noise_level)]
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
        let cov = self.gram(x);
        let grad = CovGrad::new(&[cov.clone()])?;
        Ok((cov, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_kernel() -> Result<(), KernelError> {
        const PI: f64 = std::f64::consts::PI;
        let kernel = WhiteKernel::new(PI)?;

        assert::close(kernel.parameters()[0], PI.ln(), 1E-10);

        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let y = DMatrix::from_row_slice(2, 2, &[5.0, 7.0, 6.0, 8.0]);

        let cov = kernel.covariance(&x, &y);
        assert_eq!(cov, DMatrix::zeros(2, 2));

        let (cov, grad) = kernel.covariance_with_gradient(&x)?;

        let expected_cov = DMatrix::from_row_slice(2, 2, &[PI, 0.0, 0.0, PI]);
        let expected_grad =
            CovGrad::from_row_slices(2, 1, &[PI, 0.0, 0.0, PI])?;
        assert!(cov.relative_eq(&expected_cov, 1E-8, 1E-8));
        assert!(grad.relative_eq(&expected_grad, 1E-8, 1E-8));
        assert_eq!(kernel.diag(&x), DVector::from_element(2, PI));
        assert_eq!(kernel.gram(&x), expected_cov);
        Ok(())
    }

    #[test]
    fn white_kernel_rejects_zero() {
        assert!(WhiteKernel::new(0.0).is_err());
        assert!(WhiteKernel::new(1.0).unwrap().reparameterize(&[]).is_err());
    }
}
