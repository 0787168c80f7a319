use super::{CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Scales a base kernel by a learned output scale, `k(x, x') = s * base(x, x')`
///
/// The output scale is the first log-scale parameter, followed by the
/// parameters of the base kernel.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ScaleKernel<K: Kernel> {
    outputscale: f64,
    base: K,
}

impl<K: Kernel> ScaleKernel<K> {
    /// Wrap `base` with the given output scale
    pub fn new(outputscale: f64, base: K) -> Result<Self, KernelError> {
        if outputscale > 0.0 && outputscale.is_finite() {
            Ok(Self { outputscale, base })
        } else {
            Err(KernelError::positive("outputscale", outputscale))
        }
    }

    /// The output scale
    #[must_use]
    pub fn outputscale(&self) -> f64 {
        self.outputscale
    }

    /// The wrapped kernel
    pub fn base(&self) -> &K {
        &self.base
    }
}

impl<K: Kernel> Kernel for ScaleKernel<K> {
    fn n_parameters(&self) -> usize {
        1 + self.base.n_parameters()
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
        self.base.covariance(x1, x2) * self.outputscale
    }

    fn is_stationary(&self) -> bool {
        self.base.is_stationary()
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.base.diag(x) * self.outputscale
    }

    fn gram<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.base.gram(x) * self.outputscale
    }

    fn parameters(&self) -> DVector<f64> {
        let base = self.base.parameters();
        DVector::from_iterator(
            1 + base.len(),
            std::iter::once(self.outputscale.ln()).chain(base.iter().copied()),
        )
    }

    fn hyperparameters(&self) -> Vec<(&'static str, f64)> {
        let mut hp = vec![("outputscale", self.outputscale)];
        hp.extend(self.base.hyperparameters());
        hp
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        let (scale, rest) = params
            .split_first()
            .ok_or(KernelError::MissingParameters(self.n_parameters()))?;
        let (base, left) = self.base.consume_parameters(rest)?;
        if left.is_empty() {
            Self::new(scale.exp(), base)
        } else {
            Err(KernelError::ExtraneousParameters(left.len()))
        }
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
        let (base_cov, base_grad) = self.base.covariance_with_gradient(x)?;
        let cov = base_cov * self.outputscale;

        // d(s K)/d(ln s) = s K
        let grad = CovGrad::new(&[cov.clone()])?
            .concat(&base_grad.scale(self.outputscale))?;
        Ok((cov, grad))
    }
}
